// Domain layer: data model, import targets and ports (interfaces).

pub mod model;
pub mod ports;
pub mod query;
pub mod target;
