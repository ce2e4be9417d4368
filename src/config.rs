//! Configuration (§6, §9). Treats the richer of the source's two
//! near-duplicate `Configuration` shapes as authoritative: `mode_computation`,
//! `mode_repartition`, `mode_inflation`, `n_multi_steps`, `consider_traffic`.

use serde::{Deserialize, Serialize};

use crate::error::{ReachError, Result};
use crate::vehicle::VehicleParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateSystem {
    Cartesian,
    Curvilinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferencePoint {
    Rear,
    Center,
}

/// Only the polytopic modes are in scope; the graph-based online/offline
/// modes are a deliberate Non-goal (§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputationMode {
    PolytopicNative,
    PolytopicAccelerated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepartitionMode {
    Pre,
    Post,
    PrePost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InflationMode {
    Inscribed,
    Circumscribed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlanningConfig {
    pub dt: f64,
    pub step_start: i64,
    pub steps_computation: u32,
    pub coordinate_system: CoordinateSystem,
    pub reference_point: ReferencePoint,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InitialStateConfig {
    pub p_lon_0: f64,
    pub p_lat_0: f64,
    pub v_lon_0: f64,
    pub v_lat_0: f64,
    pub uncertainty_p_lon: f64,
    pub uncertainty_p_lat: f64,
    pub uncertainty_v_lon: f64,
    /// Lateral-velocity uncertainty. `None` defaults to `0.0` in
    /// curvilinear mode (see Open Question below); Cartesian mode requires
    /// this be given explicitly.
    pub uncertainty_v_lat: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReachableSetConfig {
    pub mode_computation: ComputationMode,
    pub mode_repartition: RepartitionMode,
    pub mode_inflation: InflationMode,
    pub size_grid: f64,
    pub size_grid_2nd: f64,
    pub radius_terminal_split: f64,
    pub num_threads: usize,
    pub n_multi_steps: u32,
    pub prune_nodes_not_reaching_final_step: bool,
    pub consider_traffic: bool,
    pub corridor_cap: usize,
}

impl Default for ReachableSetConfig {
    fn default() -> Self {
        Self {
            mode_computation: ComputationMode::PolytopicNative,
            mode_repartition: RepartitionMode::PrePost,
            mode_inflation: InflationMode::Circumscribed,
            size_grid: 0.2,
            size_grid_2nd: 0.2,
            radius_terminal_split: 0.05,
            num_threads: 1,
            n_multi_steps: 1,
            prune_nodes_not_reaching_final_step: true,
            consider_traffic: true,
            corridor_cap: 10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Configuration {
    pub planning: PlanningConfig,
    pub initial_state: InitialStateConfig,
    pub vehicle: VehicleParams,
    pub reachable_set: ReachableSetConfig,
}

impl Configuration {
    pub fn validate(&self) -> Result<()> {
        if self.planning.dt <= 0.0 || (self.planning.dt - round1(self.planning.dt)).abs() > 1e-9 {
            return Err(ReachError::ConfigInvalid(
                "dt must be a positive multiple of 0.1s".into(),
            ));
        }
        if self.planning.step_start < 0 {
            return Err(ReachError::ConfigInvalid("step_start must be >= 0".into()));
        }
        if self.planning.steps_computation < 1 {
            return Err(ReachError::ConfigInvalid(
                "steps_computation must be >= 1".into(),
            ));
        }

        let finite_initial = [
            self.initial_state.p_lon_0,
            self.initial_state.p_lat_0,
            self.initial_state.v_lon_0,
            self.initial_state.v_lat_0,
            self.initial_state.uncertainty_p_lon,
            self.initial_state.uncertainty_p_lat,
            self.initial_state.uncertainty_v_lon,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite_initial {
            return Err(ReachError::ConfigInvalid(
                "initial-state parameters must be finite".into(),
            ));
        }

        if self.planning.coordinate_system == CoordinateSystem::Cartesian
            && self.initial_state.uncertainty_v_lat.is_none()
        {
            return Err(ReachError::ConfigInvalid(
                "uncertainty_v_lat is required in Cartesian mode".into(),
            ));
        }

        if self.reachable_set.size_grid <= 0.0 || self.reachable_set.size_grid_2nd <= 0.0 {
            return Err(ReachError::ConfigInvalid("grid sizes must be positive".into()));
        }
        if self.reachable_set.radius_terminal_split <= 0.0 {
            return Err(ReachError::ConfigInvalid(
                "radius_terminal_split must be positive".into(),
            ));
        }

        self.vehicle.validate()
    }

    /// Lateral-velocity uncertainty, applying the curvilinear-mode default
    /// of `0.0` decided in the Open Question (SPEC_FULL.md §3.3).
    pub fn uncertainty_v_lat(&self) -> f64 {
        self.initial_state.uncertainty_v_lat.unwrap_or(0.0)
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[cfg(test)]
mod test {
    use super::*;

    fn base_config() -> Configuration {
        Configuration {
            planning: PlanningConfig {
                dt: 0.1,
                step_start: 0,
                steps_computation: 10,
                coordinate_system: CoordinateSystem::Cartesian,
                reference_point: ReferencePoint::Rear,
            },
            initial_state: InitialStateConfig {
                p_lon_0: 0.0,
                p_lat_0: 0.0,
                v_lon_0: 10.0,
                v_lat_0: 0.0,
                uncertainty_p_lon: 0.0,
                uncertainty_p_lat: 0.0,
                uncertainty_v_lon: 0.0,
                uncertainty_v_lat: Some(0.0),
            },
            vehicle: VehicleParams {
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
            },
            reachable_set: ReachableSetConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn non_multiple_of_tenth_dt_rejected() {
        let mut c = base_config();
        c.planning.dt = 0.23;
        assert!(c.validate().is_err());
    }

    #[test]
    fn cartesian_mode_requires_explicit_lateral_velocity_uncertainty() {
        let mut c = base_config();
        c.initial_state.uncertainty_v_lat = None;
        assert!(c.validate().is_err());
    }

    #[test]
    fn curvilinear_mode_defaults_lateral_velocity_uncertainty_to_zero() {
        let mut c = base_config();
        c.planning.coordinate_system = CoordinateSystem::Curvilinear;
        c.initial_state.uncertainty_v_lat = None;
        assert!(c.validate().is_ok());
        assert_eq!(c.uncertainty_v_lat(), 0.0);
    }

    #[test]
    fn bad_horizon_rejected() {
        let mut c = base_config();
        c.planning.steps_computation = 0;
        assert!(c.validate().is_err());
    }
}
