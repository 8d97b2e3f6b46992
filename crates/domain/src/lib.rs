pub mod entities;
pub mod estimator;
pub mod ports;
pub mod preprocessing;
pub mod repositories;
pub mod value_objects;

pub use entities::*;
pub use estimator::{Classifier, EnsembleModel, Estimator, SoftmaxModel};
pub use ports::*;
pub use preprocessing::{LabelEncoder, PreprocessingPair, StandardScaler};
pub use repositories::*;
pub use tuner_errors::{TunerError, TunerResult};
pub use value_objects::*;
