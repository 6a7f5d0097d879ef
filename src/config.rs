use std::num::NonZeroU32;
use std::time::Duration;

use log::LevelFilter;
use typed_builder::TypedBuilder;

use crate::target::{PixelFormat, Viewport};

/// Configuration for a single connection channel.
///
/// Passed explicitly at channel construction time; channels hold no ambient
/// process-wide state. In particular the channel's diagnostic `verbosity` is
/// its own: per-message logging is gated on this threshold regardless of the
/// process-global logger filter.
#[derive(Clone, Debug, TypedBuilder)]
pub struct ChannelConfiguration {
    /// How long a blocking receive may wait for bytes before failing with a
    /// transport error. `None` blocks indefinitely.
    ///
    /// A finite read timeout also bounds how long a session takes to notice
    /// its shutdown signal while waiting for the master's next transform.
    #[builder(default)]
    pub read_timeout: Option<Duration>,

    /// How long a blocking send may wait for the peer to acknowledge bytes
    /// before failing with a transport error. `None` blocks indefinitely.
    #[builder(default)]
    pub write_timeout: Option<Duration>,

    /// Upper bound on the byte length of a single received message. A peer
    /// announcing a longer payload fails the receive with an allocation
    /// error instead of an unbounded buffer reservation.
    #[builder(default = 1 << 30)]
    pub max_payload_bytes: u64,

    /// This channel's own logging threshold for per-message diagnostics.
    #[builder(default = LevelFilter::Info)]
    pub verbosity: LevelFilter,
}

/// What the steady-state loop does when frames fail repeatedly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameFailurePolicy {
    /// Skip the failed frame and keep serving. The loop never gives up.
    SkipIndefinitely,

    /// End the session after this many consecutive failures. The counter
    /// resets on every success.
    AbortAfter(NonZeroU32),
}

impl FrameFailurePolicy {
    /// Whether `consecutive_failures` has reached this policy's limit.
    pub(crate) fn limit_reached(&self, consecutive_failures: u32) -> bool {
        match self {
            FrameFailurePolicy::SkipIndefinitely => false,
            FrameFailurePolicy::AbortAfter(limit) => consecutive_failures >= limit.get(),
        }
    }
}

/// Operator-specified parameters for one slave session.
#[derive(Clone, Debug, TypedBuilder)]
pub struct SessionConfiguration {
    /// The viewport negotiated with the master. The offscreen target is
    /// allocated at `target_scale` times this resolution.
    pub viewport: Viewport,

    /// Resolution scale factor applied to `viewport` when allocating the
    /// offscreen target.
    #[builder(default = 1.0)]
    pub target_scale: f32,

    /// Pixel format of the offscreen target.
    #[builder(default = PixelFormat::Rgba8)]
    pub pixel_format: PixelFormat,

    /// Policy for transform-receive failures in the steady-state loop.
    /// The default skips dropped frames indefinitely: a transient drop on
    /// the master side should not take the session down.
    #[builder(default = FrameFailurePolicy::SkipIndefinitely)]
    pub receive_failure_policy: FrameFailurePolicy,

    /// Policy for image-transmit failures in the steady-state loop. The
    /// default ends the session on the first failure: a master that cannot
    /// accept frames has no use for this slave.
    #[builder(default = FrameFailurePolicy::AbortAfter(NonZeroU32::MIN))]
    pub transmit_failure_policy: FrameFailurePolicy,

    /// Print session events using the default CSV loggers?
    #[builder(default = true)]
    pub log_events: bool,
}

impl SessionConfiguration {
    /// The offscreen target resolution: `viewport` scaled by `target_scale`.
    pub fn scaled_viewport(&self) -> Viewport {
        self.viewport.scaled(self.target_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_defaults() {
        let config = ChannelConfiguration::builder().build();
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.write_timeout, None);
        assert_eq!(config.max_payload_bytes, 1 << 30);
        assert_eq!(config.verbosity, LevelFilter::Info);
    }

    #[test]
    fn session_defaults() {
        let config = SessionConfiguration::builder()
            .viewport(Viewport::with_size(640, 480))
            .build();
        assert_eq!(config.target_scale, 1.0);
        assert_eq!(config.pixel_format, PixelFormat::Rgba8);
        assert_eq!(
            config.receive_failure_policy,
            FrameFailurePolicy::SkipIndefinitely
        );
        assert_eq!(
            config.transmit_failure_policy,
            FrameFailurePolicy::AbortAfter(NonZeroU32::MIN)
        );
        assert_eq!(config.scaled_viewport(), Viewport::with_size(640, 480));
    }

    #[test]
    fn failure_policy_limits() {
        assert!(!FrameFailurePolicy::SkipIndefinitely.limit_reached(u32::MAX));
        let abort_after_3 = FrameFailurePolicy::AbortAfter(NonZeroU32::new(3).unwrap());
        assert!(!abort_after_3.limit_reached(2));
        assert!(abort_after_3.limit_reached(3));
    }
}
