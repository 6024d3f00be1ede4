mod link;

pub use link::{Link, LinkKind, UnknownLinkKind, Visit};
