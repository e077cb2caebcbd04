//! Stock taps: the side effects shipped with the crate.
//!
//! Each constructor returns a ready-to-install [`Tap`] with the forwarding
//! policy; none of them suppresses, blocks, or touches the call context.
//!
//! - [`call_logger`] writes one bounded line per intercepted call.
//! - [`hidden_caller_probe`] consults the registry and logs only calls whose
//!   caller is currently hidden.
//! - [`unhide_on_exit`] drops exiting identifiers from the hidden set so dead
//!   entries do not accumulate.

use std::sync::Arc;

use crate::registry::HiddenRegistry;
use crate::sink::{LogSink, Stream};
use crate::table::Operation;

use super::tap::Tap;

/// Tap logging every intercepted call.
///
/// Writes one line per call naming the operation and the caller. On busy
/// operations this is the noisiest tap in the crate; point it at a sink that
/// can take the volume.
#[must_use]
pub fn call_logger(sink: Arc<dyn LogSink>) -> Tap {
    Tap::new("call-logger").observe(move |ctx| {
        sink.log(
            Stream::Output,
            &format!("{} intercepted from PID {}.", ctx.operation(), ctx.caller()),
        );
    })
}

/// Tap logging calls made by hidden identifiers.
///
/// Consults the registry on every call and stays silent unless the caller is
/// currently hidden; the call is forwarded either way.
#[must_use]
pub fn hidden_caller_probe(registry: Arc<HiddenRegistry>, sink: Arc<dyn LogSink>) -> Tap {
    Tap::new("hidden-caller-probe").observe(move |ctx| {
        if registry.is_hidden(ctx.caller()) {
            sink.log(
                Stream::Output,
                &format!("Hidden PID {} invoked {}.", ctx.caller(), ctx.operation()),
            );
        }
    })
}

/// Tap unhiding identifiers as they exit.
///
/// On [`Operation::ExitNotify`] the exiting caller is removed from the hidden
/// set through [`HiddenRegistry::try_unhide`], best effort: the registry
/// writes its usual `unhidden` line when an entry was actually dropped and
/// nothing otherwise, even when concurrent exit notifications race for the
/// same identifier. Intended for the exit-notification slot; on any other
/// operation the tap does nothing.
#[must_use]
pub fn unhide_on_exit(registry: Arc<HiddenRegistry>) -> Tap {
    Tap::new("unhide-on-exit").observe(move |ctx| {
        if ctx.operation() == Operation::ExitNotify {
            let _ = registry.try_unhide(ctx.caller());
        }
    })
}
