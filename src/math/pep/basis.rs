use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::certificate::Certificate;

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(0);

struct BasisState {
    epoch: u64,
    points: Cell<usize>,
    values: Cell<usize>,
    functions: Cell<usize>,
    certificate: RefCell<Option<Rc<Certificate>>>,
}

/// Registry of the leaf dimensions of one performance estimation problem.
///
/// Every leaf point, leaf function value and leaf function receives a dense
/// index from its registry. Each registry carries a process-unique epoch, so
/// two problems never share an index space: handles minted by one problem
/// are rejected by every other one.
///
/// The handle is reference counted and deliberately `!Send`: a problem is
/// built and solved on a single thread.
#[derive(Clone)]
pub struct Basis {
    state: Rc<BasisState>,
}

impl Basis {
    /// Creates an empty registry with a fresh epoch.
    pub fn new() -> Self {
        Self {
            state: Rc::new(BasisState {
                epoch: NEXT_EPOCH.fetch_add(1, Ordering::Relaxed),
                points: Cell::new(0),
                values: Cell::new(0),
                functions: Cell::new(0),
                certificate: RefCell::new(None),
            }),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.state.epoch
    }

    /// Number of leaf points minted so far (the Gram matrix dimension).
    pub fn point_count(&self) -> usize {
        self.state.points.get()
    }

    /// Number of leaf function values minted so far.
    pub fn value_count(&self) -> usize {
        self.state.values.get()
    }

    /// Number of leaf functions declared so far.
    pub fn function_count(&self) -> usize {
        self.state.functions.get()
    }

    pub fn is_same(&self, other: &Basis) -> bool {
        self.state.epoch == other.state.epoch
    }

    /// The certificate of the last successful solve, if any.
    pub fn certificate(&self) -> Option<Rc<Certificate>> {
        self.state.certificate.borrow().clone()
    }

    pub(crate) fn set_certificate(&self, certificate: Option<Rc<Certificate>>) {
        *self.state.certificate.borrow_mut() = certificate;
    }

    pub(crate) fn next_point(&self) -> usize {
        bump(&self.state.points)
    }

    pub(crate) fn next_value(&self) -> usize {
        bump(&self.state.values)
    }

    pub(crate) fn next_function(&self) -> usize {
        bump(&self.state.functions)
    }

    /// Panics when `other` belongs to a different problem.
    pub(crate) fn assert_same(&self, other: &Basis, what: &str) {
        assert!(
            self.is_same(other),
            "cannot combine {} minted under basis epoch {} with basis epoch {}",
            what,
            other.epoch(),
            self.epoch()
        );
    }
}

fn bump(counter: &Cell<usize>) -> usize {
    let index = counter.get();
    counter.set(index + 1);
    index
}

impl Default for Basis {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Basis")
            .field("epoch", &self.epoch())
            .field("points", &self.point_count())
            .field("values", &self.value_count())
            .field("functions", &self.function_count())
            .finish()
    }
}
