//! Event Aggregation View (C7): unions a family's own events with its
//! synced school closure events and daycare events into one sorted view.

pub mod aggregation;
