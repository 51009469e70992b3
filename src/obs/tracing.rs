// self
use crate::{_prelude::*, obs::InjectionOutcome};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedStage<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedStage<F> = F;

/// A span builder used around each interception stage.
#[derive(Clone, Debug)]
pub struct InterceptSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl InterceptSpan {
	/// Creates a new span tagged with the provided stage.
	pub fn new(stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::debug_span!(
				"id_token_injector.intercept",
				stage,
				outcome = tracing::field::Empty,
				trusted = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self {}
		}
	}

	/// Fills in the `outcome` and `trusted` fields once the stage has finished.
	pub fn record_outcome(&self, outcome: InjectionOutcome, trusted: bool) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("outcome", outcome.as_str());
			self.span.record("trusted", trusted);
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (outcome, trusted);
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedStage<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs why a request left without a token. Provider and resolution failures log at `warn`;
/// everything else at `debug`.
pub fn log_skipped(outcome: InjectionOutcome, detail: &dyn Display) {
	#[cfg(feature = "tracing")]
	match outcome {
		InjectionOutcome::MintFailed | InjectionOutcome::ServerUnresolved => tracing::warn!(
			outcome = outcome.as_str(),
			"sending request without identity token: {detail}"
		),
		_ => tracing::debug!(outcome = outcome.as_str(), "identity token not injected: {detail}"),
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (outcome, detail);
	}
}

/// Logs a one-off informational event (construction, retries).
pub fn log_event(message: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::info!("{message}");

	#[cfg(not(feature = "tracing"))]
	{
		let _ = message;
	}
}
