use super::{Lifecycle, Service, ServiceContext, ServiceState};
use crate::{Configuration, GameAction, Result, StrokePattern};

/// Owns the active stroke pattern. Pattern changes arrive as scheduled
/// actions; the most recent one in a tick wins.
#[derive(Debug)]
pub struct StrokeService {
    lifecycle: Lifecycle,
    changes: usize,
}

impl Default for StrokeService {
    fn default() -> Self {
        Self::new()
    }
}

impl StrokeService {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new("stroke"),
            changes: 0,
        }
    }

    /// Pattern changes applied since the last initialisation.
    pub fn changes(&self) -> usize {
        self.changes
    }
}

impl Service for StrokeService {
    fn name(&self) -> &'static str {
        "stroke"
    }

    fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    fn initialize(&mut self, _config: &Configuration, ctx: &mut ServiceContext<'_>) -> Result<()> {
        if !self.lifecycle.begin_initialize()? {
            return Ok(());
        }
        self.changes = 0;
        ctx.session.set_stroke_pattern(StrokePattern::Steady);
        self.lifecycle.finish_initialize(Ok(()))
    }

    fn stop(&mut self, ctx: &mut ServiceContext<'_>) {
        if !self.lifecycle.begin_stop() {
            return;
        }
        ctx.session.set_stroke_pattern(StrokePattern::Steady);
        self.lifecycle.finish_stop();
    }

    fn sync(&mut self, ctx: &mut ServiceContext<'_>) -> Result<()> {
        if !self.lifecycle.is_running() {
            return Ok(());
        }

        let latest = ctx
            .session
            .triggered_actions()
            .iter()
            .rev()
            .find_map(|action| match action {
                GameAction::SetPattern { pattern } => Some(*pattern),
                _ => None,
            });

        if let Some(pattern) = latest {
            if pattern != ctx.session.stroke_pattern() {
                tracing::debug!(?pattern, "stroke pattern changed");
                ctx.session.set_stroke_pattern(pattern);
                self.changes += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::harness::ServiceHarness;

    #[test]
    fn applies_latest_pattern_action() {
        let mut harness = ServiceHarness::new(Configuration::default());
        let mut service = StrokeService::new();
        service
            .initialize(&Configuration::default(), &mut harness.ctx())
            .unwrap();

        harness.session.push_action(GameAction::SetPattern {
            pattern: StrokePattern::Double,
        });
        harness.session.push_action(GameAction::Moan);
        harness.session.push_action(GameAction::SetPattern {
            pattern: StrokePattern::Half,
        });
        service.sync(&mut harness.ctx()).unwrap();

        assert_eq!(harness.session.stroke_pattern(), StrokePattern::Half);
        assert_eq!(service.changes(), 1);
    }

    #[test]
    fn ignores_actions_while_idle() {
        let mut harness = ServiceHarness::new(Configuration::default());
        let mut service = StrokeService::new();
        harness.session.push_action(GameAction::SetPattern {
            pattern: StrokePattern::Pause,
        });

        service.sync(&mut harness.ctx()).unwrap();

        assert_eq!(harness.session.stroke_pattern(), StrokePattern::Steady);
    }

    #[test]
    fn stop_restores_steady_and_is_idempotent() {
        let mut harness = ServiceHarness::new(Configuration::default());
        let mut service = StrokeService::new();
        service
            .initialize(&Configuration::default(), &mut harness.ctx())
            .unwrap();
        harness.session.set_stroke_pattern(StrokePattern::Double);

        service.stop(&mut harness.ctx());
        harness.session.set_stroke_pattern(StrokePattern::Half);
        service.stop(&mut harness.ctx());

        assert_eq!(service.state(), ServiceState::Idle);
        assert_eq!(harness.session.stroke_pattern(), StrokePattern::Half);
    }
}
