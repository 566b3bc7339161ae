//! Widget bindings and the registration API.
//!
//! A binding describes one widget type: how to find its host elements, what
//! value it starts with, and how to render it. Bindings are registered once
//! and instantiated per matching element:
//! - [`register_input`] / [`register_output`] store the binding
//! - [`bind_all`] scans the host document and mounts each matching element
//!   at most once per page lifetime
//! - mounted input values are observable per element id via [`input_value`]
//! - output payloads are routed per element id via [`render_output`]
//!
//! Selectors are deliberately small: `.name` matches a class token, anything
//! else matches a tag name. A binding without a selector matches elements
//! carrying its own name as a class, mirroring the host convention.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use spark_signals::{Signal, signal};
use thiserror::Error;
use tracing::warn;

use crate::channel::{UpdateChannel, UpdatePriority};
use crate::host::{self, NodeId};
use crate::mount;
use crate::resolve::Prop;

// =============================================================================
// Binding Types
// =============================================================================

/// What an input binding's render function receives.
pub struct RenderProps<T> {
    /// The rehydrated configuration tree (empty object when not configured).
    pub props: Prop,
    /// The binding's initial value, also already pushed to the host.
    pub initial_value: T,
    /// Forwards new widget values to the host, tagged with the binding's
    /// update priority.
    pub update_value: Rc<dyn Fn(T)>,
}

/// Render function invoked once per mounted input element.
pub type InputRender<T> = Rc<dyn Fn(NodeId, RenderProps<T>)>;

/// Render function invoked for every payload pushed at an output element.
pub type OutputRender<T> = Rc<dyn Fn(NodeId, &T)>;

/// Immutable description of one input widget type.
pub struct WidgetBinding<T> {
    pub name: String,
    /// Element selector; `None` means "class equal to the binding name".
    pub selector: Option<String>,
    pub initial_value: T,
    pub priority: UpdatePriority,
    pub render: InputRender<T>,
}

impl<T> WidgetBinding<T> {
    pub fn new(name: &str, initial_value: T, render: InputRender<T>) -> Self {
        Self {
            name: name.to_string(),
            selector: None,
            initial_value,
            priority: UpdatePriority::Immediate,
            render,
        }
    }

    pub fn with_selector(mut self, selector: &str) -> Self {
        self.selector = Some(selector.to_string());
        self
    }

    pub fn with_priority(mut self, priority: UpdatePriority) -> Self {
        self.priority = priority;
        self
    }

    fn selector(&self) -> String {
        match &self.selector {
            Some(selector) => selector.clone(),
            None => format!(".{}", self.name),
        }
    }
}

/// Immutable description of one output widget type.
pub struct OutputBinding<T> {
    pub name: String,
    pub selector: Option<String>,
    pub render: OutputRender<T>,
}

impl<T> OutputBinding<T> {
    pub fn new(name: &str, render: OutputRender<T>) -> Self {
        Self {
            name: name.to_string(),
            selector: None,
            render,
        }
    }

    pub fn with_selector(mut self, selector: &str) -> Self {
        self.selector = Some(selector.to_string());
        self
    }

    fn selector(&self) -> String {
        match &self.selector {
            Some(selector) => selector.clone(),
            None => format!(".{}", self.name),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Failures at the host-facing routing surface.
#[derive(Debug, Error)]
pub enum BindError {
    /// No output binding is mounted at that element id.
    #[error("no output binding mounted at element id {0:?}")]
    UnknownOutput(String),
    /// The pushed payload does not deserialize into the binding's type.
    #[error("output payload for element id {id:?} does not match the binding: {source}")]
    Payload {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// Registry State
// =============================================================================

struct Registration {
    selector: String,
    setup: Box<dyn Fn(NodeId)>,
}

thread_local! {
    /// Registered bindings, input and output alike, in registration order.
    static REGISTRATIONS: RefCell<Vec<Registration>> = RefCell::new(Vec::new());

    /// Elements that have already been mounted. Mounting is once per
    /// element per page lifetime.
    static MOUNTED: RefCell<HashSet<NodeId>> = RefCell::new(HashSet::new());

    /// Element id -> latest input value, as reported through the channel.
    static INPUT_VALUES: RefCell<HashMap<String, Signal<Value>>> = RefCell::new(HashMap::new());

    /// Element id -> output payload receiver.
    static OUTPUT_RECEIVERS: RefCell<HashMap<String, Box<dyn Fn(&Value) -> Result<(), BindError>>>> =
        RefCell::new(HashMap::new());

    /// Stop handles for output render effects, released on reset.
    static OUTPUT_STOPS: RefCell<Vec<Box<dyn FnOnce()>>> = RefCell::new(Vec::new());
}

// =============================================================================
// Registration
// =============================================================================

/// Register an input binding. Matching elements are mounted on the next
/// [`bind_all`] pass.
pub fn register_input<T>(binding: WidgetBinding<T>)
where
    T: Clone + Serialize + 'static,
{
    let selector = binding.selector();
    let setup = Box::new(move |el: NodeId| {
        let Some(id) = host::dom_id(el) else {
            warn!(
                binding = %binding.name,
                "matched element has no document id; skipping mount"
            );
            return;
        };

        let value_signal: Signal<Value> = signal(Value::Null);
        INPUT_VALUES.with(|values| {
            values
                .borrow_mut()
                .insert(id.clone(), value_signal.clone())
        });

        let notify = Rc::new(move |value: T| match serde_json::to_value(&value) {
            Ok(json) => {
                value_signal.set(json);
            }
            Err(err) => warn!(element = %id, %err, "widget value is not serializable; dropped"),
        });
        let channel = UpdateChannel::new(notify);
        mount::mount(el, &binding, &channel);
    });
    REGISTRATIONS.with(|regs| regs.borrow_mut().push(Registration { selector, setup }));
}

/// Register an output binding. Matching elements are mounted on the next
/// [`bind_all`] pass; payloads pushed via [`render_output`] re-render them.
pub fn register_output<T>(binding: OutputBinding<T>)
where
    T: Clone + PartialEq + DeserializeOwned + 'static,
{
    let selector = binding.selector();
    let setup = Box::new(move |el: NodeId| {
        let Some(id) = host::dom_id(el) else {
            warn!(
                binding = %binding.name,
                "matched element has no document id; skipping mount"
            );
            return;
        };

        let instance = mount::mount_output(el, &binding);
        let payload = instance.payload.clone();
        let key = id.clone();
        let receiver = Box::new(move |raw: &Value| -> Result<(), BindError> {
            let parsed: T = serde_json::from_value(raw.clone()).map_err(|source| {
                BindError::Payload { id: id.clone(), source }
            })?;
            payload.set(Some(parsed));
            Ok(())
        });
        OUTPUT_RECEIVERS.with(|receivers| receivers.borrow_mut().insert(key, receiver));
        OUTPUT_STOPS.with(|stops| stops.borrow_mut().push(instance.into_stop()));
    });
    REGISTRATIONS.with(|regs| regs.borrow_mut().push(Registration { selector, setup }));
}

// =============================================================================
// Binding Pass
// =============================================================================

fn matches(el: NodeId, selector: &str) -> bool {
    match selector.strip_prefix('.') {
        Some(class) => host::has_class(el, class),
        None => host::tag_of(el) == selector,
    }
}

/// Scan the host document and mount every element that matches a registered
/// binding and has not been mounted yet. Returns how many elements were
/// mounted by this pass; repeated passes are safe.
pub fn bind_all() -> usize {
    let mut mounted_now = 0;
    for el in host::all_elements() {
        let already = MOUNTED.with(|mounted| mounted.borrow().contains(&el));
        if already {
            continue;
        }

        // First matching registration wins for an element
        let matched = REGISTRATIONS.with(|regs| {
            let regs = regs.borrow();
            regs.iter().position(|reg| matches(el, &reg.selector))
        });
        let Some(index) = matched else { continue };

        MOUNTED.with(|mounted| mounted.borrow_mut().insert(el));
        REGISTRATIONS.with(|regs| {
            let regs = regs.borrow();
            (regs[index].setup)(el);
        });
        mounted_now += 1;
    }
    mounted_now
}

// =============================================================================
// Host-Facing Value Surface
// =============================================================================

/// Latest value reported by the input mounted at `dom_id`.
///
/// `Value::Null` until the widget's initial value arrives, which happens
/// during mount, before its first render. Reading from inside an effect
/// creates a reactive dependency.
pub fn input_value(dom_id: &str) -> Option<Value> {
    input_value_signal(dom_id).map(|s| s.get())
}

/// The underlying value signal for the input mounted at `dom_id`.
pub fn input_value_signal(dom_id: &str) -> Option<Signal<Value>> {
    INPUT_VALUES.with(|values| values.borrow().get(dom_id).cloned())
}

/// Push a payload to the output mounted at `dom_id`, re-rendering it.
pub fn render_output(dom_id: &str, payload: &Value) -> Result<(), BindError> {
    OUTPUT_RECEIVERS.with(|receivers| {
        let receivers = receivers.borrow();
        match receivers.get(dom_id) {
            Some(receiver) => receiver(payload),
            None => Err(BindError::UnknownOutput(dom_id.to_string())),
        }
    })
}

// =============================================================================
// Reset (for testing)
// =============================================================================

/// Drop all registrations, mounted-element tracking, value signals, and
/// output effects (for testing).
pub fn reset_bindings() {
    REGISTRATIONS.with(|regs| regs.borrow_mut().clear());
    MOUNTED.with(|mounted| mounted.borrow_mut().clear());
    INPUT_VALUES.with(|values| values.borrow_mut().clear());
    OUTPUT_RECEIVERS.with(|receivers| receivers.borrow_mut().clear());
    let stops = OUTPUT_STOPS.with(|stops| stops.borrow_mut().split_off(0));
    for stop in stops {
        stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::reset_channel_state;
    use crate::host::{create_element, reset_host, set_attribute, set_dom_id};
    use serde_json::json;
    use std::cell::Cell;

    fn reset_all() {
        reset_host();
        reset_bindings();
        reset_channel_state();
    }

    fn counting_input(name: &str, mounts: Rc<Cell<usize>>) -> WidgetBinding<i32> {
        let render = Rc::new(move |_el, _props: RenderProps<i32>| {
            mounts.set(mounts.get() + 1);
        });
        WidgetBinding::new(name, 0, render)
    }

    #[test]
    fn test_bind_all_mounts_once_per_element() {
        reset_all();

        let el = create_element("div");
        set_dom_id(el, "counter");
        set_attribute(el, "class", "custom-input");

        let mounts = Rc::new(Cell::new(0));
        register_input(counting_input("custom-input", mounts.clone()));

        assert_eq!(bind_all(), 1);
        assert_eq!(mounts.get(), 1);

        // Second pass finds nothing new
        assert_eq!(bind_all(), 0);
        assert_eq!(mounts.get(), 1);
    }

    #[test]
    fn test_selector_defaults_to_class_name() {
        reset_all();

        let matching = create_element("div");
        set_dom_id(matching, "a");
        set_attribute(matching, "class", "my-widget framed");
        let other = create_element("div");
        set_dom_id(other, "b");
        set_attribute(other, "class", "unrelated");

        let mounts = Rc::new(Cell::new(0));
        register_input(counting_input("my-widget", mounts.clone()));

        assert_eq!(bind_all(), 1);
        assert_eq!(mounts.get(), 1);
    }

    #[test]
    fn test_tag_selector() {
        reset_all();

        let el = create_element("custom-slider");
        set_dom_id(el, "s");

        let mounts = Rc::new(Cell::new(0));
        register_input(counting_input("slider", mounts.clone()).with_selector("custom-slider"));

        assert_eq!(bind_all(), 1);
        assert_eq!(mounts.get(), 1);
    }

    #[test]
    fn test_element_without_id_is_skipped() {
        reset_all();

        let el = create_element("div");
        set_attribute(el, "class", "custom-input");

        let mounts = Rc::new(Cell::new(0));
        register_input(counting_input("custom-input", mounts.clone()));

        // The element matches (and is claimed by the pass) but the setup
        // refuses to mount without a document id
        assert_eq!(bind_all(), 1);
        assert_eq!(mounts.get(), 0);
    }

    #[test]
    fn test_input_value_tracks_initial_value() {
        reset_all();

        let el = create_element("div");
        set_dom_id(el, "counter");
        set_attribute(el, "class", "custom-input");

        let render = Rc::new(|_el, _props: RenderProps<i32>| {});
        register_input(WidgetBinding::new("custom-input", 7, render));
        bind_all();

        assert_eq!(input_value("counter"), Some(json!(7)));
        assert_eq!(input_value("unknown"), None);
    }

    #[test]
    fn test_update_value_reaches_input_value() {
        reset_all();

        let el = create_element("div");
        set_dom_id(el, "counter");
        set_attribute(el, "class", "custom-input");

        let update = Rc::new(RefCell::new(None));
        let update_slot = update.clone();
        let render = Rc::new(move |_el, props: RenderProps<i32>| {
            *update_slot.borrow_mut() = Some(props.update_value.clone());
        });
        register_input(WidgetBinding::new("custom-input", 0, render));
        bind_all();

        // Both the initial push and later updates flow through the same
        // serializing notify path into the value signal
        assert_eq!(input_value("counter"), Some(json!(0)));
        let update_value = update.borrow().clone().expect("render ran");
        update_value(12);
        assert_eq!(input_value("counter"), Some(json!(12)));
    }

    #[test]
    fn test_output_round_trip() {
        reset_all();

        let el = create_element("div");
        set_dom_id(el, "out");
        set_attribute(el, "class", "custom-output");

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let render = Rc::new(move |_el, value: &i32| sink.borrow_mut().push(*value));
        register_output(OutputBinding::new("custom-output", render));
        bind_all();

        render_output("out", &json!(3)).unwrap();
        render_output("out", &json!(9)).unwrap();
        assert_eq!(*seen.borrow(), vec![3, 9]);
    }

    #[test]
    fn test_output_errors_are_typed() {
        reset_all();

        let el = create_element("div");
        set_dom_id(el, "out");
        set_attribute(el, "class", "custom-output");
        register_output(OutputBinding::new(
            "custom-output",
            Rc::new(|_el, _value: &i32| {}),
        ));
        bind_all();

        assert!(matches!(
            render_output("nope", &json!(1)),
            Err(BindError::UnknownOutput(_))
        ));
        assert!(matches!(
            render_output("out", &json!("not a number")),
            Err(BindError::Payload { .. })
        ));
    }
}
