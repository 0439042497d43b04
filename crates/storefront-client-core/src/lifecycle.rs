//! Mount/unmount hooks driven by the navigation controller's "content
//! reloaded" signal.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

/// Emitted once per successful partial load, after the new content is in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentReloaded {
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentScope {
    /// Bound to the swapped content region; torn down and rebuilt on every reload.
    Page,
    /// Lives outside the content region; only re-asserts its state on reload.
    Persistent,
}

pub trait LifecycleComponent {
    fn name(&self) -> &str;

    fn scope(&self) -> ComponentScope {
        ComponentScope::Page
    }

    fn mount(&self, context: &ContentReloaded);

    fn unmount(&self) {}
}

#[derive(Default)]
pub struct LifecycleRegistry {
    components: RefCell<Vec<Rc<dyn LifecycleComponent>>>,
}

impl LifecycleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, component: Rc<dyn LifecycleComponent>) {
        self.components.borrow_mut().push(component);
    }

    pub fn len(&self) -> usize {
        self.components.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.borrow().is_empty()
    }

    /// Mounts every component against the initial document.
    pub fn mount_all(&self, context: &ContentReloaded) {
        for component in self.snapshot() {
            component.mount(context);
        }
    }

    /// Page components are unmounted then mounted; persistent ones are mounted again.
    pub fn content_reloaded(&self, context: &ContentReloaded) {
        for component in self.snapshot() {
            if component.scope() == ComponentScope::Page {
                component.unmount();
            }
            debug!(component = component.name(), url = %context.url, "remounting component");
            component.mount(context);
        }
    }

    /// Tears everything down, e.g. when the page is being unloaded.
    pub fn unmount_all(&self) {
        for component in self.snapshot() {
            component.unmount();
        }
    }

    // Components may register others while being mounted.
    fn snapshot(&self) -> Vec<Rc<dyn LifecycleComponent>> {
        self.components.borrow().clone()
    }
}
