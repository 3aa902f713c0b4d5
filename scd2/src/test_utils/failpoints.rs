use fail::FailScenario;

/// Configures failpoints on setup and turns them off again on drop.
///
/// Holding a scenario serializes tests that use failpoints.
pub struct CustomFailScenario<'a> {
    _scenario: FailScenario<'a>,
    failpoints: Vec<(String, String)>,
}

impl<'a> CustomFailScenario<'a> {
    pub fn setup(failpoints: &[(&str, &str)]) -> CustomFailScenario<'a> {
        let scenario = FailScenario::setup();
        let failpoints = failpoints
            .iter()
            .map(|(name, action)| (name.to_string(), action.to_string()))
            .collect::<Vec<_>>();

        for (failpoint, action) in failpoints.iter() {
            fail::cfg(failpoint, action).unwrap()
        }

        Self {
            _scenario: scenario,
            failpoints,
        }
    }

    /// Configures one more failpoint, turned off again on drop.
    pub fn configure(&mut self, failpoint: &str, action: &str) {
        fail::cfg(failpoint, action).unwrap();
        self.failpoints
            .push((failpoint.to_string(), action.to_string()));
    }

    pub fn teardown(self) {
        drop(self);
    }
}

impl<'a> Drop for CustomFailScenario<'a> {
    fn drop(&mut self) {
        for (failpoint, _) in self.failpoints.iter() {
            fail::cfg(failpoint, "off").unwrap()
        }
    }
}
