//! Mount controller - one widget instance, start to finish.
//!
//! [`mount`] is the setup callback handed to the registration layer. For an
//! input widget it runs the whole pipeline in one synchronous pass:
//!
//! ```text
//! push initial value -> parse data-props -> rehydrate references
//!   -> strip data-props -> invoke the render function once
//! ```
//!
//! The initial value reaches the host before the render function runs, and
//! the render function only ever sees a fully rehydrated tree.
//!
//! [`mount_output`] is the output-direction counterpart: it installs a
//! render effect that re-invokes the binding's render function whenever the
//! host pushes a new payload.

use std::rc::Rc;

use spark_signals::{Signal, effect, signal};

use crate::binding::{OutputBinding, RenderProps, WidgetBinding};
use crate::channel::UpdateChannel;
use crate::config::{self, PROPS_ATTR};
use crate::host::{self, NodeId};
use crate::resolve::{Prop, resolve};

// =============================================================================
// Input Mount
// =============================================================================

/// Mount an input widget on a host element.
///
/// Runs at most once per element; the registration layer guards against
/// re-invocation. Completes fully before returning - there is no partial
/// state a caller can observe.
pub fn mount<T: Clone + 'static>(
    el: NodeId,
    binding: &WidgetBinding<T>,
    channel: &UpdateChannel<T>,
) {
    // The host observes a defined value even before the first paint
    channel.push(binding.initial_value.clone(), false);

    let raw = host::get_attribute(el, PROPS_ATTR);
    let props = match config::parse(raw.as_deref()) {
        Some(tree) => resolve(&tree, el),
        None => Prop::empty_object(),
    };

    // One-way cleanup, unconditional even when nothing was resolved
    host::remove_attribute(el, PROPS_ATTR);

    let deferred = binding.priority.is_deferred();
    let forward = channel.clone();
    let update_value = Rc::new(move |value: T| forward.push(value, deferred));

    (binding.render)(
        el,
        RenderProps {
            props,
            initial_value: binding.initial_value.clone(),
            update_value,
        },
    );
}

// =============================================================================
// Output Mount
// =============================================================================

/// A mounted output widget: the payload signal the host pushes into, and
/// the stop handle for its render effect.
pub struct OutputInstance<T: Clone + PartialEq + 'static> {
    /// `None` until the first payload arrives; each `Some` re-renders.
    pub payload: Signal<Option<T>>,
    stop: Box<dyn FnOnce()>,
}

impl<T: Clone + PartialEq + 'static> OutputInstance<T> {
    /// Push a payload directly, bypassing the JSON routing surface.
    pub fn push_payload(&self, value: T) {
        self.payload.set(Some(value));
    }

    /// Give up the render effect's stop handle.
    pub fn into_stop(self) -> Box<dyn FnOnce()> {
        self.stop
    }
}

/// Mount an output widget on a host element.
///
/// Installs an effect that invokes the binding's render function for every
/// payload the host pushes. Nothing renders until the first payload.
pub fn mount_output<T: Clone + PartialEq + 'static>(
    el: NodeId,
    binding: &OutputBinding<T>,
) -> OutputInstance<T> {
    let payload: Signal<Option<T>> = signal(None);

    let render = binding.render.clone();
    let watched = payload.clone();
    let stop = effect(move || {
        if let Some(value) = watched.get() {
            render(el, &value);
        }
    });

    OutputInstance {
        payload,
        stop: Box::new(stop),
    }
}
