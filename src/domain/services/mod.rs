mod node_selector;

pub use node_selector::{
    DeterministicKeySelector, FixedPrimarySelector, NodeSelector, RoutingError, SelectorKind,
};
