mod bid_state;
mod event;
mod rules;

pub use {
    bid_state::*,
    event::*,
    rules::*,
};
