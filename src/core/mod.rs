pub mod bin_simulation;
pub mod design_conditions;
pub mod equipment;
pub mod load_line;
pub mod manufacturer_data;
pub mod performance;
pub mod psychrometrics;
pub mod regression;
pub(crate) mod solvers;
pub mod units;
