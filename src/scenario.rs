//! Scenario provider: the out-of-scope collaborator (§1) that supplies a
//! computation's horizon parameters and obstacle world. Parsing a
//! persisted scenario file is left to the host application; this module
//! only fixes the oracle's contract plus a minimal in-memory
//! implementation so the engine is independently testable.

use crate::collision::ObstacleWorld;

pub trait ScenarioProvider {
    fn dt(&self) -> f64;
    fn step_start(&self) -> i64;
    fn steps_computation(&self) -> u32;
    fn obstacle_world(&self) -> &ObstacleWorld;
}

/// A scenario fixed entirely at construction time.
pub struct FixedScenario {
    dt: f64,
    step_start: i64,
    steps_computation: u32,
    world: ObstacleWorld,
}

impl FixedScenario {
    pub fn new(dt: f64, step_start: i64, steps_computation: u32, world: ObstacleWorld) -> Self {
        Self {
            dt,
            step_start,
            steps_computation,
            world,
        }
    }
}

impl ScenarioProvider for FixedScenario {
    fn dt(&self) -> f64 {
        self.dt
    }

    fn step_start(&self) -> i64 {
        self.step_start
    }

    fn steps_computation(&self) -> u32 {
        self.steps_computation
    }

    fn obstacle_world(&self) -> &ObstacleWorld {
        &self.world
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fixed_scenario_exposes_its_fields() {
        let scenario = FixedScenario::new(0.1, 0, 10, ObstacleWorld::new());
        assert_eq!(scenario.dt(), 0.1);
        assert_eq!(scenario.step_start(), 0);
        assert_eq!(scenario.steps_computation(), 10);
    }
}
