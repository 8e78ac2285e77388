use crate::core::psychrometrics::{hr_from_wb, wb_from_hr};
use crate::core::units::{pressure_at_elevation, ElevationOutOfRangeError};
use crate::input::TemperatureBin;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum DesignConditionsError {
    #[error("No temperature bins were given to find the design wet bulb from")]
    NoBins,
    #[error(transparent)]
    Elevation(#[from] ElevationOutOfRangeError),
    #[error("Design wet bulb could not be found for {odb} °F and humidity ratio {ohr}")]
    WetBulb { odb: f64, ohr: f64 },
}

/// Outdoor state at the cooling design point of a location.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DesignConditions {
    pub odb: f64,
    pub owb: f64,
    pub ohr: f64,
    pub pressure: f64,
    pub elevation_ft: f64,
    /// The design dry bulb asked for, when no bin was hotter and the warmest bin was used instead
    pub requested_odb: Option<f64>,
}

/// Resolve the design outdoor state from a design dry bulb and the location's bin table.
///
/// The design humidity ratio is interpolated between the bins either side of the design dry
/// bulb, so that the top stage just runs continuously at design. Bins must be sorted by
/// ascending temperature. When no bin is hotter than the design temperature, the warmest bin
/// becomes the design point.
pub fn resolve_design_conditions(
    design_odb: f64,
    elevation_ft: f64,
    bins: &[TemperatureBin],
) -> Result<DesignConditions, DesignConditionsError> {
    let pressure = pressure_at_elevation(elevation_ft)?;

    let mut previous = (0., 0.);
    let mut warmest = None;
    let mut hotter = None;

    for bin in bins {
        let ohr = hr_from_wb(bin.odb, bin.owb, pressure);
        if bin.odb > design_odb {
            hotter = Some((bin.odb, ohr));
            break;
        }
        previous = (bin.odb, ohr);
        warmest = Some(previous);
    }

    let (odb, ohr, requested_odb) = match (hotter, warmest) {
        (Some((hotter_odb, hotter_ohr)), _) => {
            let (previous_odb, previous_ohr) = previous;
            let fraction = (design_odb - previous_odb) / (hotter_odb - previous_odb);
            (
                design_odb,
                fraction * (hotter_ohr - previous_ohr) + previous_ohr,
                None,
            )
        }
        (None, Some((warmest_odb, warmest_ohr))) => {
            warn!(
                "The design temperature has been changed from {design_odb:.1} to {warmest_odb:.1} \
                 as no bin is warmer than the design temperature"
            );
            (warmest_odb, warmest_ohr, Some(design_odb))
        }
        (None, None) => return Err(DesignConditionsError::NoBins),
    };

    let owb = wb_from_hr(odb, ohr, pressure).ok_or(DesignConditionsError::WetBulb { odb, ohr })?;

    Ok(DesignConditions {
        odb,
        owb,
        ohr,
        pressure,
        elevation_ft,
        requested_odb,
    })
}
