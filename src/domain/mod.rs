// Domain layer: models and ports. Adapters live in `config`, use cases in `core`.

pub mod model;
pub mod ports;
