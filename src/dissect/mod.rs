//! UDP application-layer decoders.
//!
//! Each decoder is a pure function over a UDP payload returning `None` when
//! the bytes are not (or not entirely) that protocol. Only the fields the
//! engine aggregates are extracted.
//!
//! - [`dns`]: header flags and question section
//! - [`ntp`]: mode, version, stratum, reference id
//! - [`dhcp`]: BOOTP op, client addresses, option 53
//! - [`radius`]: packet code

pub mod dhcp;
pub mod dns;
pub mod ntp;
pub mod radius;
