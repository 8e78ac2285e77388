//! Operating performance of a packaged unit: correction curves, stage capacities, condenser and
//! blower power, coil airflow and the staging decision made each bin.
pub mod air;
pub mod capacity;
pub mod curves;
pub mod economizer;
pub mod flow_fraction;
pub mod power;
pub mod staging;
