//! The reserved-ASN sentinel values folded into [`Origin`].
//!
//! A cell's believed origin AS is either a real ASN, or one of three
//! non-values: locally originated (empty AS path), behind an AS-set /
//! confederation segment, or simply down (no route at all). The three
//! non-values occupy three consecutive ASNs inside the IANA 16-bit
//! Private Use range (RFC 6996, 64512-65534) so they can never collide
//! with a real, routable origin.

/// First of three consecutive reserved ASNs used to encode [`Origin`]'s
/// non-real variants on the wire. Chosen from the top of the 16-bit
/// private-use range to stay far from documentation prefixes and common
/// lab ASNs that tend to cluster near the bottom of that range.
pub const RESERVED_BASE: u32 = 65_530;

/// `origin_asn == ORIGIN_LOCAL` — the AS path was empty (locally originated).
pub const ORIGIN_LOCAL: u32 = RESERVED_BASE;
/// `origin_asn == ORIGIN_SET_OR_CONFED` — the path's last segment was an
/// AS-set or confederation segment rather than a single ASN.
pub const ORIGIN_SET_OR_CONFED: u32 = RESERVED_BASE + 1;
/// `origin_asn == ORIGIN_DOWN` — no route is currently believed live.
pub const ORIGIN_DOWN: u32 = RESERVED_BASE + 2;

/// The believed origin of a (prefix, peer) cell.
///
/// Wire-compatible with a plain `u32`: [`Origin::to_wire`] and
/// [`Origin::from_wire`] convert to/from the reserved-band encoding real
/// collaborators (sinks, metrics) may still want, while the engine itself
/// always works with this tagged union internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// A real, routable ASN. Never falls inside the reserved band.
    Real(u32),
    /// The AS path was empty.
    Local,
    /// The AS path's last segment was an AS-set or confederation.
    SetOrConfed,
    /// No route is currently believed live for this cell.
    Down,
}

impl Origin {
    /// `true` for anything other than [`Origin::Down`].
    pub fn is_route(&self) -> bool {
        !matches!(self, Origin::Down)
    }

    /// Encode as the reserved-band `u32` wire representation.
    pub fn to_wire(self) -> u32 {
        match self {
            Origin::Real(asn) => asn,
            Origin::Local => ORIGIN_LOCAL,
            Origin::SetOrConfed => ORIGIN_SET_OR_CONFED,
            Origin::Down => ORIGIN_DOWN,
        }
    }

    /// Decode from the reserved-band `u32` wire representation.
    pub fn from_wire(value: u32) -> Self {
        match value {
            ORIGIN_LOCAL => Origin::Local,
            ORIGIN_SET_OR_CONFED => Origin::SetOrConfed,
            ORIGIN_DOWN => Origin::Down,
            asn => Origin::Real(asn),
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Real(asn) => write!(f, "{asn}"),
            Origin::Local => f.write_str("local"),
            Origin::SetOrConfed => f.write_str("as-set"),
            Origin::Down => f.write_str("down"),
        }
    }
}

/// One segment of an AS path, mirroring the distinction BGP itself makes
/// between a single traversed AS and an unordered AS-set (e.g. from
/// confederations or aggregation).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AsSegment {
    Num(u32),
    Set(Vec<u32>),
}

/// Extract the origin from a full AS path, per the rules in §4.E.1:
/// empty path is local, a trailing single-ASN segment is a real origin,
/// a trailing set/confederation segment is [`Origin::SetOrConfed`].
pub fn extract_origin(as_path: &[AsSegment]) -> Origin {
    match as_path.last() {
        None => Origin::Local,
        Some(AsSegment::Num(asn)) => Origin::Real(*asn),
        Some(AsSegment::Set(_)) => Origin::SetOrConfed,
    }
}
