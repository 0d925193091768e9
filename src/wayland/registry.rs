//! Bookkeeping of the globals advertised by the registry

use tracing::{debug, info};

use super::output::{Output, OutputBackend};
use crate::{pattern::PatternConfig, session::SessionEvent};

/// Fills `slot` with the result of `bind` unless it is already bound
///
/// Returns whether `bind` was called.
pub(super) fn bind_once<T>(slot: &mut Option<T>, interface: &str, name: u32, bind: impl FnOnce() -> T) -> bool {
    if slot.is_some() {
        debug!(interface, name, "Ignoring duplicate global");
        return false;
    }
    *slot = Some(bind());
    true
}

/// Every output currently followed, keyed by registry name
#[derive(Debug)]
pub(super) struct Outputs<B: OutputBackend> {
    outputs: Vec<Output<B>>,
}

impl<B: OutputBackend> Outputs<B> {
    pub(super) fn new() -> Outputs<B> {
        Outputs { outputs: Vec::new() }
    }

    pub(super) fn len(&self) -> usize {
        self.outputs.len()
    }

    #[cfg(test)]
    pub(super) fn get(&self, name: u32) -> Option<&Output<B>> {
        self.outputs.iter().find(|output| output.name() == name)
    }

    /// Starts following a freshly bound output
    pub(super) fn add(&mut self, mut output: Output<B>, config: &PatternConfig, ctx: &B::Context<'_>) {
        info!(output = output.name(), version = output.version(), "New output");
        output.handle(SessionEvent::Bound, config, ctx);
        if output.version() < 2 {
            // no done event before version 2, everything is sent right after binding
            output.handle(SessionEvent::Done, config, ctx);
        }
        self.outputs.push(output);
    }

    /// Routes an event to the output bound from global `name`
    pub(super) fn event(&mut self, name: u32, event: SessionEvent, config: &PatternConfig, ctx: &B::Context<'_>) {
        match self.outputs.iter_mut().find(|output| output.name() == name) {
            Some(output) => output.handle(event, config, ctx),
            None => debug!(output = name, ?event, "Event for unknown output"),
        }
    }

    /// Tears down and forgets the output bound from global `name`
    ///
    /// Returns `false` when `name` is not an output.
    pub(super) fn remove(&mut self, name: u32, config: &PatternConfig, ctx: &B::Context<'_>) -> bool {
        let Some(index) = self.outputs.iter().position(|output| output.name() == name) else {
            debug!(name, "Removed global is not an output");
            return false;
        };

        let mut output = self.outputs.swap_remove(index);
        info!(output = name, "Output removed");
        output.teardown(config, ctx);
        true
    }

    /// Tears down every output
    pub(super) fn clear(&mut self, config: &PatternConfig, ctx: &B::Context<'_>) {
        for mut output in self.outputs.drain(..) {
            output.teardown(config, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{bind_once, Outputs};
    use crate::{
        pattern::PatternConfig,
        session::{SessionEvent, SessionState},
        utils::Serial,
        wayland::output::{
            tests::{RecordingBackend, Request},
            Output,
        },
    };

    fn outputs_with(names: &[(u32, u32)]) -> Outputs<RecordingBackend> {
        let mut outputs = Outputs::new();
        for &(name, version) in names {
            outputs.add(
                Output::new(RecordingBackend::new(version), name),
                &PatternConfig::default(),
                &(),
            );
        }
        outputs
    }

    #[test]
    fn globals_are_bound_once() {
        let mut slot = None;
        let mut binds = 0;
        assert!(bind_once(&mut slot, "wl_shm", 1, || {
            binds += 1;
            "first"
        }));
        assert!(!bind_once(&mut slot, "wl_shm", 2, || {
            binds += 1;
            "second"
        }));
        assert_eq!(binds, 1);
        assert_eq!(slot, Some("first"));
    }

    #[test]
    fn old_outputs_are_described_when_bound() {
        let outputs = outputs_with(&[(1, 1), (2, 4)]);
        let old = outputs.get(1).unwrap();
        assert_eq!(old.session().state(), SessionState::SurfaceRequested);
        assert_eq!(old.backend().requests(), vec![Request::GetLayerSurface(1)]);

        // newer outputs wait for their done event
        let new = outputs.get(2).unwrap();
        assert_eq!(new.session().state(), SessionState::DescriptionPending);
        assert!(new.backend().requests().is_empty());
    }

    #[test]
    fn events_reach_their_output() {
        let config = PatternConfig::default();
        let mut outputs = outputs_with(&[(1, 4), (2, 4)]);
        outputs.event(2, SessionEvent::Done, &config, &());
        outputs.event(
            2,
            SessionEvent::Configure {
                serial: Serial::from(6),
                size: (4, 4).into(),
            },
            &config,
            &(),
        );
        // unknown names are dropped
        outputs.event(42, SessionEvent::Done, &config, &());

        assert_eq!(outputs.get(1).unwrap().session().state(), SessionState::DescriptionPending);
        assert!(outputs
            .get(2)
            .unwrap()
            .backend()
            .requests()
            .contains(&Request::AckConfigure(Serial::from(6))));
    }

    #[test]
    fn removing_an_unknown_global_is_a_noop() {
        let mut outputs = outputs_with(&[(1, 4)]);
        assert!(!outputs.remove(7, &PatternConfig::default(), &()));
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs.get(1).unwrap().session().state(), SessionState::DescriptionPending);
    }

    #[test]
    fn removal_tears_down_and_forgets_the_output() {
        let mut outputs = outputs_with(&[(2, 1)]);
        let backend = RecordingBackend::new(1);
        let log = backend.log();
        outputs.add(Output::new(backend, 1), &PatternConfig::default(), &());

        assert!(outputs.remove(1, &PatternConfig::default(), &()));
        assert_eq!(outputs.len(), 1);
        assert!(outputs.get(1).is_none());
        assert!(outputs.get(2).is_some());
        assert_eq!(
            *log.borrow(),
            vec![
                Request::GetLayerSurface(1),
                Request::ReleaseSurface,
                Request::ReleaseOutput
            ]
        );
    }

    #[test]
    fn clear_forgets_every_output() {
        let mut outputs = outputs_with(&[(1, 1), (2, 4), (3, 3)]);
        outputs.clear(&PatternConfig::default(), &());
        assert_eq!(outputs.len(), 0);
    }
}
