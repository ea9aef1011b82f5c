//! Capture filter compilation.
//!
//! Compiles a subset of the libpcap filter language into a predicate over
//! classified packets:
//!
//! ```text
//! expr      := and_expr (("or" | "||") and_expr)*
//! and_expr  := unary (("and" | "&&") unary)*
//! unary     := ("not" | "!") unary | "(" expr ")" | primitive
//! primitive := [proto] [dir] [type] value | proto | ("less" | "greater") N
//! proto     := ip | ip6 | arp | tcp | udp | icmp | icmp6
//! dir       := src | dst | src or dst | src and dst
//! type      := host | net | port | portrange
//! ```
//!
//! As in libpcap, a bare value after `and`/`or` reuses the qualifiers of the
//! previous primitive, so `port 80 or 443` means `port 80 or port 443`.

use std::net::IpAddr;

use crate::models::packet::{NetworkLayer, PacketRecord, TransportLayer};
use crate::utils::error::{CaptureError, CaptureResult};

const END_TOKEN: &str = "<end of expression>";

/// Protocol qualifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proto {
    Ip,
    Ip6,
    Arp,
    Tcp,
    Udp,
    Icmp,
    Icmp6,
}

/// Direction qualifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Src,
    Dst,
    SrcOrDst,
    SrcAndDst,
}

/// What a primitive tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Protocol presence only
    Proto,
    Host(IpAddr),
    Net { addr: IpAddr, prefix: u8 },
    Ports { low: u16, high: u16 },
    LengthAtMost(usize),
    LengthAtLeast(usize),
}

/// Parsed filter expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpr {
    Primitive {
        proto: Option<Proto>,
        dir: Direction,
        target: Target,
    },
    Not(Box<FilterExpr>),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
}

/// A compiled capture filter; the empty expression matches everything
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFilter {
    expression: String,
    root: Option<FilterExpr>,
}

impl CompiledFilter {
    /// Compile a filter expression
    pub fn compile(expression: &str) -> CaptureResult<Self> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Ok(Self::match_all());
        }

        let tokens = tokenize(expression)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            last: None,
        };
        let root = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(CaptureError::invalid_filter(
                token.text(),
                "unexpected token after complete expression",
            ));
        }

        Ok(Self {
            expression: expression.to_string(),
            root: Some(root),
        })
    }

    /// Filter that admits every packet
    pub fn match_all() -> Self {
        Self {
            expression: String::new(),
            root: None,
        }
    }

    /// Normalized source text of the filter
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn is_match_all(&self) -> bool {
        self.root.is_none()
    }

    /// Evaluate the filter against a classified packet
    pub fn matches(&self, record: &PacketRecord) -> bool {
        match &self.root {
            Some(expr) => expr.matches(record),
            None => true,
        }
    }
}

impl FilterExpr {
    pub fn matches(&self, record: &PacketRecord) -> bool {
        match self {
            FilterExpr::Not(inner) => !inner.matches(record),
            FilterExpr::And(lhs, rhs) => lhs.matches(record) && rhs.matches(record),
            FilterExpr::Or(lhs, rhs) => lhs.matches(record) || rhs.matches(record),
            FilterExpr::Primitive { proto, dir, target } => {
                if let Some(proto) = proto {
                    if !proto_present(*proto, record) {
                        return false;
                    }
                }
                target_matches(*dir, target, record)
            }
        }
    }
}

fn proto_present(proto: Proto, record: &PacketRecord) -> bool {
    match proto {
        Proto::Ip => matches!(record.network_layer, Some(NetworkLayer::Ipv4 { .. })),
        Proto::Ip6 => matches!(record.network_layer, Some(NetworkLayer::Ipv6 { .. })),
        Proto::Arp => matches!(record.network_layer, Some(NetworkLayer::Arp { .. })),
        Proto::Tcp => matches!(record.transport_layer, Some(TransportLayer::Tcp { .. })),
        Proto::Udp => matches!(record.transport_layer, Some(TransportLayer::Udp { .. })),
        Proto::Icmp => matches!(
            record.transport_layer,
            Some(TransportLayer::Icmp { v6: false, .. })
        ),
        Proto::Icmp6 => matches!(
            record.transport_layer,
            Some(TransportLayer::Icmp { v6: true, .. })
        ),
    }
}

fn target_matches(dir: Direction, target: &Target, record: &PacketRecord) -> bool {
    match *target {
        Target::Proto => true,
        Target::Host(host) => by_direction(dir, record.src_address, record.dst_address, |addr| {
            addr == host
        }),
        Target::Net { addr, prefix } => {
            by_direction(dir, record.src_address, record.dst_address, |candidate| {
                in_network(candidate, addr, prefix)
            })
        }
        Target::Ports { low, high } => {
            let has_ports = record
                .transport_layer
                .as_ref()
                .map_or(false, TransportLayer::has_ports);
            has_ports
                && by_direction(dir, record.src_port, record.dst_port, |port| {
                    (low..=high).contains(&port)
                })
        }
        Target::LengthAtMost(limit) => record.length <= limit,
        Target::LengthAtLeast(limit) => record.length >= limit,
    }
}

fn by_direction<T, F>(dir: Direction, src: Option<T>, dst: Option<T>, test: F) -> bool
where
    T: Copy,
    F: Fn(T) -> bool,
{
    let src = src.map_or(false, &test);
    let dst = dst.map_or(false, &test);
    match dir {
        Direction::Src => src,
        Direction::Dst => dst,
        Direction::SrcOrDst => src || dst,
        Direction::SrcAndDst => src && dst,
    }
}

fn in_network(candidate: IpAddr, network: IpAddr, prefix: u8) -> bool {
    match (candidate, network) {
        (IpAddr::V4(c), IpAddr::V4(n)) => {
            let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - u32::from(prefix)) };
            u32::from(c) & mask == u32::from(n) & mask
        }
        (IpAddr::V6(c), IpAddr::V6(n)) => {
            let mask = if prefix == 0 { 0 } else { u128::MAX << (128 - u32::from(prefix)) };
            u128::from(c) & mask == u128::from(n) & mask
        }
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    LParen,
    RParen,
    Not,
    And,
    Or,
}

impl Token {
    fn text(&self) -> &str {
        match self {
            Token::Word(word) => word,
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Not => "not",
            Token::And => "and",
            Token::Or => "or",
        }
    }
}

fn tokenize(expression: &str) -> CaptureResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '&' | '|' => {
                chars.next();
                if chars.next_if_eq(&c).is_none() {
                    return Err(CaptureError::invalid_filter(
                        c.to_string(),
                        format!("expected '{}{}'", c, c),
                    ));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '!' | '&' | '|') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Word(word),
                });
            }
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Host,
    Net,
    Port,
    PortRange,
}

/// Qualifiers of the last value primitive, reused by bare values
#[derive(Debug, Clone, Copy)]
struct Qualifiers {
    proto: Option<Proto>,
    dir: Direction,
    kind: Kind,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    last: Option<Qualifiers>,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_word(&self, offset: usize) -> Option<String> {
        match self.tokens.get(self.pos + offset) {
            Some(Token::Word(word)) => Some(word.to_ascii_lowercase()),
            _ => None,
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> CaptureResult<FilterExpr> {
        let mut expr = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let rhs = self.parse_and()?;
            expr = FilterExpr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> CaptureResult<FilterExpr> {
        let mut expr = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let rhs = self.parse_unary()?;
            expr = FilterExpr::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> CaptureResult<FilterExpr> {
        match self.peek() {
            Some(Token::Not) => {
                self.next();
                Ok(FilterExpr::Not(Box::new(self.parse_unary()?)))
            }
            Some(Token::LParen) => {
                self.next();
                let expr = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(expr),
                    Some(other) => Err(CaptureError::invalid_filter(
                        other.text(),
                        "expected ')'",
                    )),
                    None => Err(CaptureError::invalid_filter(
                        END_TOKEN,
                        "unbalanced parenthesis, expected ')'",
                    )),
                }
            }
            Some(Token::Word(_)) => self.parse_primitive(),
            Some(other) => Err(CaptureError::invalid_filter(
                other.text(),
                "expected a primitive",
            )),
            None => Err(CaptureError::invalid_filter(END_TOKEN, "expected a primitive")),
        }
    }

    fn parse_primitive(&mut self) -> CaptureResult<FilterExpr> {
        let first = self.peek_word(0).unwrap_or_default();

        if first == "less" || first == "greater" {
            self.next();
            let value = self.expect_value("a length")?;
            let length: usize = value.parse().map_err(|_| {
                CaptureError::invalid_filter(&value, "length must be a non-negative integer")
            })?;
            let target = if first == "less" {
                Target::LengthAtMost(length)
            } else {
                Target::LengthAtLeast(length)
            };
            return Ok(FilterExpr::Primitive {
                proto: None,
                dir: Direction::SrcOrDst,
                target,
            });
        }

        let proto = parse_proto(&first);
        if proto.is_some() {
            self.next();
        }

        let dir = self.parse_direction();

        let kind = self.peek_word(0).and_then(|word| parse_kind(&word));
        if kind.is_some() {
            self.next();
        }

        match (proto, dir, kind) {
            (Some(proto), None, None) => Ok(FilterExpr::Primitive {
                proto: Some(proto),
                dir: Direction::SrcOrDst,
                target: Target::Proto,
            }),
            (None, None, None) => {
                // Bare value: inherit the previous primitive's qualifiers
                let token = self
                    .next()
                    .map(|t| t.text().to_string())
                    .unwrap_or_else(|| END_TOKEN.to_string());
                match self.last {
                    Some(q) if is_value_like(&token) => {
                        let target = parse_target(q.proto, q.kind, &token)?;
                        Ok(FilterExpr::Primitive {
                            proto: q.proto,
                            dir: q.dir,
                            target,
                        })
                    }
                    _ => Err(CaptureError::invalid_filter(token, "unknown primitive")),
                }
            }
            (proto, dir, kind) => {
                // "src 10.0.0.1" means "src host 10.0.0.1"
                let kind = kind.unwrap_or(Kind::Host);
                let dir = dir.unwrap_or(Direction::SrcOrDst);
                let value = self.expect_value(kind_description(kind))?;
                let target = parse_target(proto, kind, &value)?;
                self.last = Some(Qualifiers { proto, dir, kind });
                Ok(FilterExpr::Primitive { proto, dir, target })
            }
        }
    }

    fn parse_direction(&mut self) -> Option<Direction> {
        let first = self.peek_word(0)?;
        let single = match first.as_str() {
            "src" => Direction::Src,
            "dst" => Direction::Dst,
            _ => return None,
        };
        self.next();

        // "src or dst" / "src and dst"
        let combinator = self.peek().cloned();
        let other = self.peek_word(1);
        let is_pair = matches!(
            (single, other.as_deref()),
            (Direction::Src, Some("dst")) | (Direction::Dst, Some("src"))
        );
        if is_pair {
            match combinator {
                Some(Token::Or) => {
                    self.pos += 2;
                    return Some(Direction::SrcOrDst);
                }
                Some(Token::And) => {
                    self.pos += 2;
                    return Some(Direction::SrcAndDst);
                }
                _ => {}
            }
        }
        Some(single)
    }

    fn expect_value(&mut self, what: &str) -> CaptureResult<String> {
        match self.next() {
            Some(Token::Word(word)) => Ok(word),
            Some(other) => Err(CaptureError::invalid_filter(
                other.text(),
                format!("expected {}", what),
            )),
            None => Err(CaptureError::invalid_filter(
                END_TOKEN,
                format!("expected {}", what),
            )),
        }
    }
}

fn parse_proto(word: &str) -> Option<Proto> {
    match word {
        "ip" => Some(Proto::Ip),
        "ip6" => Some(Proto::Ip6),
        "arp" => Some(Proto::Arp),
        "tcp" => Some(Proto::Tcp),
        "udp" => Some(Proto::Udp),
        "icmp" => Some(Proto::Icmp),
        "icmp6" => Some(Proto::Icmp6),
        _ => None,
    }
}

fn parse_kind(word: &str) -> Option<Kind> {
    match word {
        "host" => Some(Kind::Host),
        "net" => Some(Kind::Net),
        "port" => Some(Kind::Port),
        "portrange" => Some(Kind::PortRange),
        _ => None,
    }
}

fn kind_description(kind: Kind) -> &'static str {
    match kind {
        Kind::Host => "a host address",
        Kind::Net => "a network in CIDR notation",
        Kind::Port => "a port number or service name",
        Kind::PortRange => "a port range like 1-1024",
    }
}

fn is_value_like(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    parse_proto(&lower).is_none()
        && parse_kind(&lower).is_none()
        && !matches!(lower.as_str(), "src" | "dst" | "less" | "greater" | "(" | ")")
        && token != END_TOKEN
}

fn parse_target(proto: Option<Proto>, kind: Kind, value: &str) -> CaptureResult<Target> {
    match kind {
        Kind::Host => {
            let addr: IpAddr = value.parse().map_err(|_| {
                CaptureError::invalid_filter(value, "expected an IPv4 or IPv6 address")
            })?;
            check_family(proto, addr, value)?;
            Ok(Target::Host(addr))
        }
        Kind::Net => {
            let (addr_text, prefix_text) = match value.split_once('/') {
                Some((addr, prefix)) => (addr, Some(prefix)),
                None => (value, None),
            };
            let addr: IpAddr = addr_text.parse().map_err(|_| {
                CaptureError::invalid_filter(value, "expected a network like 10.0.0.0/8")
            })?;
            let max_prefix = if addr.is_ipv4() { 32 } else { 128 };
            let prefix = match prefix_text {
                Some(text) => text
                    .parse::<u8>()
                    .ok()
                    .filter(|p| *p <= max_prefix)
                    .ok_or_else(|| CaptureError::invalid_filter(value, "invalid prefix length"))?,
                None => max_prefix,
            };
            check_family(proto, addr, value)?;
            Ok(Target::Net { addr, prefix })
        }
        Kind::Port => {
            check_port_proto(proto, value)?;
            let port = parse_port(value)?;
            Ok(Target::Ports { low: port, high: port })
        }
        Kind::PortRange => {
            check_port_proto(proto, value)?;
            let (low, high) = value.split_once('-').ok_or_else(|| {
                CaptureError::invalid_filter(value, "expected a port range like 1-1024")
            })?;
            let (low, high) = (parse_port(low)?, parse_port(high)?);
            if low > high {
                return Err(CaptureError::invalid_filter(
                    value,
                    "range start is greater than range end",
                ));
            }
            Ok(Target::Ports { low, high })
        }
    }
}

fn check_family(proto: Option<Proto>, addr: IpAddr, value: &str) -> CaptureResult<()> {
    match (proto, addr) {
        (Some(Proto::Ip) | Some(Proto::Arp), IpAddr::V6(_)) => Err(CaptureError::invalid_filter(
            value,
            "IPv6 address used with an IPv4 qualifier",
        )),
        (Some(Proto::Ip6), IpAddr::V4(_)) => Err(CaptureError::invalid_filter(
            value,
            "IPv4 address used with 'ip6'",
        )),
        _ => Ok(()),
    }
}

fn check_port_proto(proto: Option<Proto>, value: &str) -> CaptureResult<()> {
    match proto {
        None | Some(Proto::Tcp) | Some(Proto::Udp) | Some(Proto::Ip) | Some(Proto::Ip6) => Ok(()),
        Some(_) => Err(CaptureError::invalid_filter(
            value,
            "ports are only meaningful for tcp and udp",
        )),
    }
}

fn parse_port(value: &str) -> CaptureResult<u16> {
    if let Ok(port) = value.parse::<u16>() {
        return Ok(port);
    }
    service_port(&value.to_ascii_lowercase()).ok_or_else(|| {
        CaptureError::invalid_filter(value, "expected a port number (0-65535) or service name")
    })
}

fn service_port(name: &str) -> Option<u16> {
    let port = match name {
        "ftp-data" => 20,
        "ftp" => 21,
        "ssh" => 22,
        "telnet" => 23,
        "smtp" => 25,
        "domain" | "dns" => 53,
        "bootps" => 67,
        "bootpc" => 68,
        "http" | "www" => 80,
        "pop3" => 110,
        "ntp" => 123,
        "imap" => 143,
        "snmp" => 161,
        "https" => 443,
        _ => return None,
    };
    Some(port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::packet::PacketTimestamp;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn record(transport: TransportLayer, src_port: u16, dst_port: u16) -> PacketRecord {
        let has_ports = transport.has_ports();
        PacketRecord {
            id: 1,
            timestamp: PacketTimestamp::now(Duration::ZERO),
            interface: "eth0".to_string(),
            length: 120,
            link_layer: None,
            network_layer: Some(NetworkLayer::Ipv4 { ttl: 64, protocol: 6 }),
            transport_layer: Some(transport),
            src_address: Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10))),
            dst_address: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))),
            src_port: has_ports.then_some(src_port),
            dst_port: has_ports.then_some(dst_port),
            protocol_label: "TCP".to_string(),
            payload_preview: None,
        }
    }

    fn tcp(src_port: u16, dst_port: u16) -> PacketRecord {
        record(
            TransportLayer::Tcp { flags: 0x2, sequence: 0, acknowledgement: 0, window: 0 },
            src_port,
            dst_port,
        )
    }

    fn udp(src_port: u16, dst_port: u16) -> PacketRecord {
        record(TransportLayer::Udp { length: 8 }, src_port, dst_port)
    }

    fn compile(expression: &str) -> CompiledFilter {
        CompiledFilter::compile(expression).unwrap()
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = compile("   ");
        assert!(filter.is_match_all());
        assert!(filter.matches(&udp(1, 2)));
    }

    #[test]
    fn test_tcp_port_80() {
        let filter = compile("tcp port 80");
        assert!(filter.matches(&tcp(51000, 80)));
        assert!(filter.matches(&tcp(80, 51000)));
        assert!(!filter.matches(&tcp(51000, 443)));
        assert!(!filter.matches(&udp(51000, 80)));
    }

    #[test]
    fn test_garbage_is_rejected_with_token() {
        match CompiledFilter::compile("not a filter (((") {
            Err(CaptureError::InvalidFilter { token, .. }) => assert_eq!(token, "a"),
            other => panic!("expected InvalidFilter, got {:?}", other),
        }
    }

    #[test]
    fn test_unbalanced_parenthesis() {
        let err = CompiledFilter::compile("(tcp or udp").unwrap_err();
        assert!(err.to_string().contains("unbalanced"), "{}", err);

        let err = CompiledFilter::compile("tcp )").unwrap_err();
        assert!(matches!(err, CaptureError::InvalidFilter { ref token, .. } if token == ")"));
    }

    #[test]
    fn test_bad_values() {
        assert!(CompiledFilter::compile("port 70000").is_err());
        assert!(CompiledFilter::compile("host example.com").is_err());
        assert!(CompiledFilter::compile("net 10.0.0.0/40").is_err());
        assert!(CompiledFilter::compile("portrange 90-80").is_err());
        assert!(CompiledFilter::compile("icmp port 7").is_err());
        assert!(CompiledFilter::compile("tcp &").is_err());
        assert!(CompiledFilter::compile("tcp and").is_err());
    }

    #[test]
    fn test_qualifier_inheritance() {
        let filter = compile("port 80 or 443");
        assert!(filter.matches(&tcp(51000, 443)));
        assert!(filter.matches(&udp(51000, 80)));
        assert!(!filter.matches(&tcp(51000, 22)));

        let filter = compile("dst port 53 or 123");
        assert!(filter.matches(&udp(40000, 123)));
        assert!(!filter.matches(&udp(123, 40000)));
    }

    #[test]
    fn test_boolean_operators() {
        let filter = compile("udp and not port 53");
        assert!(filter.matches(&udp(40000, 123)));
        assert!(!filter.matches(&udp(40000, 53)));
        assert!(!filter.matches(&tcp(40000, 123)));

        let filter = compile("!(tcp || udp)");
        assert!(!filter.matches(&tcp(1, 2)));
        assert!(filter.matches(&record(
            TransportLayer::Icmp { icmp_type: 8, icmp_code: 0, v6: false },
            0,
            0
        )));

        // "and" binds tighter than "or"
        let filter = compile("tcp and port 22 or udp");
        assert!(filter.matches(&udp(9, 9)));
        assert!(!filter.matches(&tcp(9, 9)));
    }

    #[test]
    fn test_host_net_and_direction() {
        assert!(compile("host 10.0.0.5").matches(&tcp(1, 2)));
        assert!(compile("src host 192.168.1.10").matches(&tcp(1, 2)));
        assert!(!compile("dst host 192.168.1.10").matches(&tcp(1, 2)));
        assert!(compile("src 192.168.1.10").matches(&tcp(1, 2)));
        assert!(compile("net 192.168.0.0/16").matches(&tcp(1, 2)));
        assert!(!compile("dst net 192.168.0.0/16").matches(&tcp(1, 2)));
        assert!(compile("src and dst net 0.0.0.0/0").matches(&tcp(1, 2)));
        assert!(compile("src or dst port 2").matches(&tcp(1, 2)));
        assert!(!compile("ip6").matches(&tcp(1, 2)));
        assert!(compile("ip").matches(&tcp(1, 2)));
    }

    #[test]
    fn test_service_names_and_ranges() {
        assert!(compile("tcp port http").matches(&tcp(50000, 80)));
        assert!(compile("udp port domain").matches(&udp(53, 50000)));
        assert!(compile("portrange 1-1024").matches(&tcp(50000, 443)));
        assert!(!compile("portrange 1-1024").matches(&tcp(50000, 8080)));
    }

    #[test]
    fn test_length_primitives() {
        assert!(compile("less 120").matches(&tcp(1, 2)));
        assert!(!compile("less 119").matches(&tcp(1, 2)));
        assert!(compile("greater 100 and tcp").matches(&tcp(1, 2)));
    }
}
