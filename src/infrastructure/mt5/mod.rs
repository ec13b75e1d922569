pub mod connector;

pub use connector::Mt5Connector;
