mod auction;

pub use auction::*;
