//! Framework layer - handlers, destinations and routing.
//!
//! This module contains the dispatch pipeline:
//! - Fault-isolating handler wrappers
//! - The destination contract and its local variants
//! - Longest-prefix routing shared by protocol and address lookup
//! - The address book and the dispatcher built on it
//! - Tower Service integration for middleware support

pub mod address_book;
pub mod destination;
pub mod dispatcher;
pub mod handler;
pub mod routing;
pub mod service;

pub use address_book::{AddressBook, RouteAddressBook};
pub use destination::{
    BoxedDestination, ConcurrentDestination, Destination, LockedDestination, MuxDestination,
};
pub use dispatcher::Dispatcher;
pub use handler::{Handler, LockedFn, ServeFn};
pub use routing::{Router, SEPARATOR, normalize};
pub use service::{DestinationService, ServiceFuture};
