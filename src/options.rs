//! Compilation policy.

/// Knobs controlling graph construction.
///
/// The defaults enable every optimization performed while building the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct CompilerOptions {
    /// The largest callee, in bytes of bytecode, that is inlined.
    pub max_inline_size: usize,
    /// The maximum nesting depth of inlined calls.
    pub max_inline_level: usize,
    /// How many times a method may be inlined into itself.
    pub max_recursive_inline_level: usize,
    /// The number of nodes after which the build bails out.
    pub max_instruction_count: usize,
    /// Whether calls are inlined at all.
    pub inline: bool,
    /// Whether `synchronized` callees are inlined.
    pub inline_synchronized_methods: bool,
    /// Whether callees with exception handlers are inlined.
    pub inline_methods_with_exception_handlers: bool,
    /// Whether calls to known JDK methods are replaced with intrinsics.
    pub intrinsify: bool,
    /// Whether foldable intrinsics with constant arguments are evaluated.
    pub fold_intrinsics: bool,
    /// Whether equivalent pure instructions within a block are reused.
    pub local_value_numbering: bool,
    /// Whether redundant field loads and stores within a block are removed.
    pub eliminate_field_access: bool,
    /// Whether constant folding and algebraic simplification run when appending instructions.
    pub canonicalize: bool,
    /// Whether the block map computes which locals are stored in loops.
    /// Otherwise every local of a loop header gets a phi.
    pub precise_loop_stores: bool,
    /// Whether virtual calls may be bound by assuming a type has no subclass.
    pub speculate_leaf_types: bool,
    /// Whether virtual calls may be bound by assuming a method is not overridden.
    pub speculate_leaf_methods: bool,
    /// Whether returning from `java/lang/Object.<init>` registers the object for finalization.
    pub register_finalizers_at_init: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            max_inline_size: 35,
            max_inline_level: 9,
            max_recursive_inline_level: 1,
            max_instruction_count: 37000,
            inline: true,
            inline_synchronized_methods: true,
            inline_methods_with_exception_handlers: true,
            intrinsify: true,
            fold_intrinsics: true,
            local_value_numbering: true,
            eliminate_field_access: true,
            canonicalize: true,
            precise_loop_stores: true,
            speculate_leaf_types: true,
            speculate_leaf_methods: true,
            register_finalizers_at_init: true,
        }
    }
}

impl CompilerOptions {
    /// Options that build the graph as a literal translation of the bytecode.
    #[must_use]
    pub fn without_optimizations() -> Self {
        Self {
            inline: false,
            intrinsify: false,
            fold_intrinsics: false,
            local_value_numbering: false,
            eliminate_field_access: false,
            canonicalize: false,
            speculate_leaf_types: false,
            speculate_leaf_methods: false,
            ..Self::default()
        }
    }
}
