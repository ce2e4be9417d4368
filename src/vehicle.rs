//! Vehicle parameters (§6, "Vehicle parameters" collaborator): acceleration
//! and velocity bounds per axis, plus the geometric extent used to derive
//! an inflation radius for obstacle checking.

use crate::config::InflationMode;
use crate::error::{ReachError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleParams {
    pub a_lon_min: f64,
    pub a_lon_max: f64,
    pub a_lat_min: f64,
    pub a_lat_max: f64,
    pub v_lon_min: f64,
    pub v_lon_max: f64,
    pub v_lat_min: f64,
    pub v_lat_max: f64,
    pub length: f64,
    pub width: f64,
}

impl VehicleParams {
    pub fn validate(&self) -> Result<()> {
        let all_finite = [
            self.a_lon_min,
            self.a_lon_max,
            self.a_lat_min,
            self.a_lat_max,
            self.v_lon_min,
            self.v_lon_max,
            self.v_lat_min,
            self.v_lat_max,
            self.length,
            self.width,
        ]
        .iter()
        .all(|v| v.is_finite());

        if !all_finite {
            return Err(ReachError::ConfigInvalid(
                "vehicle parameters must be finite".into(),
            ));
        }
        if self.a_lon_min > 0.0 || self.a_lon_max < 0.0 {
            return Err(ReachError::ConfigInvalid(
                "a_lon_min must be <= 0 <= a_lon_max".into(),
            ));
        }
        if self.a_lat_min > 0.0 || self.a_lat_max < 0.0 {
            return Err(ReachError::ConfigInvalid(
                "a_lat_min must be <= 0 <= a_lat_max".into(),
            ));
        }
        if self.v_lon_min > self.v_lon_max {
            return Err(ReachError::ConfigInvalid("v_lon_min must be <= v_lon_max".into()));
        }
        if self.v_lat_min > self.v_lat_max {
            return Err(ReachError::ConfigInvalid("v_lat_min must be <= v_lat_max".into()));
        }
        if self.length <= 0.0 || self.width <= 0.0 {
            return Err(ReachError::ConfigInvalid(
                "length and width must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Radius of the circle used to inflate obstacles by the vehicle's
    /// footprint: the inscribed circle (half the width, the tighter bound)
    /// or the circumscribed circle (half the diagonal, the conservative
    /// bound), per [`InflationMode`].
    pub fn inflation_radius(&self, mode: InflationMode) -> f64 {
        match mode {
            InflationMode::Inscribed => self.width / 2.0,
            InflationMode::Circumscribed => {
                0.5 * (self.length * self.length + self.width * self.width).sqrt()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn valid() -> VehicleParams {
        VehicleParams {
            a_lon_min: -5.0,
            a_lon_max: 5.0,
            a_lat_min: -2.0,
            a_lat_max: 2.0,
            v_lon_min: 0.0,
            v_lon_max: 30.0,
            v_lat_min: -5.0,
            v_lat_max: 5.0,
            length: 4.5,
            width: 2.0,
        }
    }

    #[test]
    fn valid_params_pass() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn positive_a_lon_min_rejected() {
        let mut p = valid();
        p.a_lon_min = 1.0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn inflation_modes_differ() {
        let p = valid();
        assert_eq!(p.inflation_radius(InflationMode::Inscribed), 1.0);
        assert!(p.inflation_radius(InflationMode::Circumscribed) > p.inflation_radius(InflationMode::Inscribed));
    }
}
