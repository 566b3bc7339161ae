//! # graft
//!
//! Embedded-resource rehydration for host/guest UI composition.
//!
//! A host UI framework hands rendering of a widget to an external rendering
//! engine, but the host may already own live element subtrees that must
//! appear *inside* that externally rendered widget. graft solves the
//! hand-off: a widget's serialized configuration may reference host-owned
//! elements by document id, and mounting rewrites every reference into a
//! portal - the element is claimed out of its old position and re-parented
//! under the widget's container, with identity and tree structure intact.
//!
//! Built on [spark-signals](https://crates.io/crates/spark-signals) for the
//! host-facing value surface.
//!
//! ## Pipeline
//!
//! ```text
//! data-props attribute → config::parse → resolve (references → portals)
//!   → mount (strip attribute, render once) → UpdateChannel → host signals
//! ```
//!
//! ## Modules
//!
//! - [`host`] - element arena modelling the externally owned resource pool
//! - [`config`] - `data-props` parsing with graceful degradation
//! - [`resolve`] - the rehydration pass (`Value` → [`Prop`])
//! - [`mount`] - per-instance mount controller, input and output
//! - [`channel`] - immediate/deferred value push with tick coalescing
//! - [`binding`] - registration API, bind pass, and value routing

pub mod binding;
pub mod channel;
pub mod config;
pub mod host;
pub mod mount;
pub mod resolve;

pub use binding::{
    BindError, InputRender, OutputBinding, OutputRender, RenderProps, WidgetBinding, bind_all,
    input_value, input_value_signal, register_input, register_output, render_output,
    reset_bindings,
};

pub use channel::{
    UpdateChannel, UpdatePriority, flush_deferred, pending_deferred, reset_channel_state,
};

pub use config::{ConfigError, PROPS_ATTR, parse, try_parse};

pub use host::{
    NodeId, append_child, children_of, create_element, detach, dom_id, get_attribute,
    get_element_by_id, has_class, parent_of, remove_attribute, reset_host, set_attribute,
    set_dom_id, tag_of,
};

pub use mount::{OutputInstance, mount, mount_output};

pub use resolve::{MAX_RESOLVE_DEPTH, Portal, Prop, REF_KEY, resolve};
