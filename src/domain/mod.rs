// Domain layer: API and persistence models plus the ports (interfaces) the
// services depend on. No I/O happens here.

pub mod model;
pub mod ports;
