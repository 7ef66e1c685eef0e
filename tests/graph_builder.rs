use mokajit::{
    BuildError, CompilerOptions, GraphBuilder, MethodGraphExt,
    bytecode::{ProgramCounter, RawInstruction, RawInstruction::*, assemble},
    ir::{Assumption, BlockFlags, Constant, Instruction, Intrinsic, IrGraph, Terminator, ValueId},
    runtime::{
        ExceptionHandler, InMemoryRuntime, MethodAccessFlags, MethodCode, MethodInfo, TypeInfo,
    },
    types::{ClassRef, MethodRef},
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn method_ref(owner: &str, name: &str, descriptor: &str) -> MethodRef {
    MethodRef {
        owner: ClassRef::new(owner),
        name: name.to_owned(),
        descriptor: descriptor.parse().expect("Invalid method descriptor"),
    }
}

fn method(
    method: MethodRef,
    access_flags: MethodAccessFlags,
    max_stack: u16,
    max_locals: u16,
    instructions: &[RawInstruction],
    exception_table: Vec<ExceptionHandler>,
) -> MethodInfo {
    let code = MethodCode {
        max_stack,
        max_locals,
        bytecode: assemble(instructions).expect("Fail to assemble"),
        exception_table,
    };
    MethodInfo::new(method, access_flags, Some(code))
}

fn returned_value(graph: &IrGraph) -> Option<ValueId> {
    graph
        .reachable_blocks()
        .into_iter()
        .find_map(|it| match graph.block(it).end.as_ref()?.terminator {
            Terminator::Return { value } => value,
            _ => None,
        })
}

fn build(runtime: &InMemoryRuntime, method: &MethodInfo) -> Result<IrGraph, BuildError> {
    init_logger();
    method.build_graph(runtime, &CompilerOptions::default())
}

fn runtime_with_test_class() -> InMemoryRuntime {
    let mut runtime = InMemoryRuntime::new();
    runtime.add_type(TypeInfo::leaf(
        ClassRef::new("Test"),
        Some(ClassRef::new(ClassRef::JAVA_LANG_OBJECT)),
    ));
    runtime
}

#[test]
fn leaf_method_is_devirtualized_and_inlined() {
    let mut runtime = runtime_with_test_class();
    let getter = method_ref("Test", "get", "()I");
    runtime.add_method(method(
        getter.clone(),
        MethodAccessFlags::PUBLIC,
        1,
        1,
        &[IConst4, IReturn],
        Vec::new(),
    ));
    let index = runtime
        .pool_mut(&ClassRef::new("Test"))
        .add_method(getter.clone());
    let caller = method(
        method_ref("Test", "caller", "()I"),
        MethodAccessFlags::PUBLIC,
        1,
        1,
        &[ALoad0, InvokeVirtual { index }, IReturn],
        Vec::new(),
    );

    let graph = build(&runtime, &caller).expect("Fail to build");
    assert_eq!(graph.inlined_methods(), &[getter.clone()]);
    assert!(
        graph
            .assumptions()
            .contains(&Assumption::LeafMethod(getter))
    );
    let result = returned_value(&graph).expect("No return value");
    assert_eq!(
        graph.value(result).instruction,
        Instruction::Constant(Constant::Int(4))
    );
    let null_checks = graph
        .instructions()
        .filter(|(_, value)| matches!(value.instruction, Instruction::NullCheck { .. }))
        .count();
    assert_eq!(null_checks, 0);
}

#[test]
fn without_speculation_the_call_stays_virtual() {
    let mut runtime = runtime_with_test_class();
    let getter = method_ref("Test", "get", "()I");
    runtime.add_method(method(
        getter.clone(),
        MethodAccessFlags::PUBLIC,
        1,
        1,
        &[IConst4, IReturn],
        Vec::new(),
    ));
    let index = runtime
        .pool_mut(&ClassRef::new("Test"))
        .add_method(getter.clone());
    let caller = method(
        method_ref("Test", "caller", "()I"),
        MethodAccessFlags::PUBLIC,
        1,
        1,
        &[ALoad0, InvokeVirtual { index }, IReturn],
        Vec::new(),
    );
    let options = CompilerOptions {
        speculate_leaf_methods: false,
        speculate_leaf_types: false,
        ..CompilerOptions::default()
    };

    let graph = GraphBuilder::new(&runtime)
        .with_options(options)
        .build(&caller)
        .expect("Fail to build");
    assert!(graph.inlined_methods().is_empty());
    assert!(graph.assumptions().is_empty());
    let result = returned_value(&graph).expect("No return value");
    assert!(matches!(
        &graph.value(result).instruction,
        Instruction::Invoke { target, .. } if *target == getter
    ));
}

#[test]
fn intrinsic_on_constants_is_folded() {
    let mut runtime = InMemoryRuntime::new();
    let index = runtime
        .pool_mut(&ClassRef::new("Test"))
        .add_method(method_ref("java/lang/Math", "abs", "(I)I"));
    let abs = method(
        method_ref("Test", "abs", "()I"),
        MethodAccessFlags::STATIC,
        1,
        0,
        &[BiPush { value: -7 }, InvokeStatic { index }, IReturn],
        Vec::new(),
    );

    let graph = build(&runtime, &abs).expect("Fail to build");
    let result = returned_value(&graph).expect("No return value");
    assert_eq!(
        graph.value(result).instruction,
        Instruction::Constant(Constant::Int(7))
    );

    let graph = abs
        .build_graph(&runtime, &CompilerOptions::without_optimizations())
        .expect("Fail to build");
    let result = returned_value(&graph).expect("No return value");
    assert!(matches!(
        graph.value(result).instruction,
        Instruction::Invoke { .. }
    ));
}

#[test]
fn object_constructor_registers_finalizer() {
    let object_init = method(
        method_ref(ClassRef::JAVA_LANG_OBJECT, "<init>", "()V"),
        MethodAccessFlags::PUBLIC,
        1,
        1,
        &[Return],
        Vec::new(),
    );
    let is_registration = |instruction: &Instruction| {
        matches!(
            instruction,
            Instruction::Intrinsic {
                intrinsic: Intrinsic::RegisterFinalizer,
                ..
            }
        )
    };

    let graph = build(&InMemoryRuntime::new(), &object_init).expect("Fail to build");
    assert_eq!(
        graph
            .instructions()
            .filter(|(_, value)| is_registration(&value.instruction))
            .count(),
        1
    );

    let mut runtime = InMemoryRuntime::new();
    runtime.add_type(TypeInfo::leaf(ClassRef::new(ClassRef::JAVA_LANG_OBJECT), None));
    let graph = build(&runtime, &object_init).expect("Fail to build");
    assert!(
        !graph
            .instructions()
            .any(|(_, value)| is_registration(&value.instruction))
    );
    assert!(graph.assumptions().contains(&Assumption::LeafType(ClassRef::new(
        ClassRef::JAVA_LANG_OBJECT
    ))));
}

#[test]
fn exception_in_callee_reaches_caller_handler() {
    let mut runtime = runtime_with_test_class();
    let length = method_ref("Test", "length", "([I)I");
    runtime.add_method(method(
        length.clone(),
        MethodAccessFlags::STATIC,
        1,
        1,
        &[ALoad0, ArrayLength, IReturn],
        Vec::new(),
    ));
    let index = runtime
        .pool_mut(&ClassRef::new("Test"))
        .add_method(length.clone());
    let caller = method(
        method_ref("Test", "caller", "([I)I"),
        MethodAccessFlags::STATIC,
        1,
        1,
        &[
            ALoad0,
            InvokeStatic { index },
            IReturn,
            Pop,
            IConstM1,
            IReturn,
        ],
        ExceptionHandler::from_table_entry(0, 5, 5, None)
            .into_iter()
            .collect(),
    );

    let graph = build(&runtime, &caller).expect("Fail to build");
    assert_eq!(graph.inlined_methods(), &[length]);
    let handler = graph
        .reachable_blocks()
        .into_iter()
        .find(|it| graph.block(*it).is(BlockFlags::EXCEPTION_ENTRY))
        .expect("The handler is unreachable");
    assert_eq!(graph.block(handler).bci, ProgramCounter::from(5));
    let thrower = graph
        .instructions()
        .find(|(_, value)| matches!(value.instruction, Instruction::ArrayLength { .. }))
        .and_then(|(_, value)| value.block)
        .expect("No array length");
    assert!(graph.block(thrower).exception_handlers.contains(&handler));
    assert!(graph.block(handler).predecessors.contains(&thrower));
}

#[test]
fn synchronized_callee_is_locked_around_its_body() {
    let mut runtime = runtime_with_test_class();
    let callee = method_ref("Test", "locked", "()I");
    runtime.add_method(method(
        callee.clone(),
        MethodAccessFlags::STATIC | MethodAccessFlags::SYNCHRONIZED,
        1,
        0,
        &[IConst1, IReturn],
        Vec::new(),
    ));
    let index = runtime.pool_mut(&ClassRef::new("Test")).add_method(callee);
    let caller = method(
        method_ref("Test", "caller", "()I"),
        MethodAccessFlags::STATIC,
        1,
        0,
        &[InvokeStatic { index }, IReturn],
        Vec::new(),
    );

    let graph = build(&runtime, &caller).expect("Fail to build");
    let monitors: Vec<_> = graph
        .instructions()
        .filter_map(|(_, value)| match &value.instruction {
            Instruction::MonitorEnter { lock, .. } => Some(("enter", *lock)),
            Instruction::MonitorExit { lock, .. } => Some(("exit", *lock)),
            _ => None,
        })
        .collect();
    assert_eq!(monitors, vec![("enter", 1), ("exit", 1)]);
}

/// `int i = 0; while (i < n) i++; return i;`
fn counting_loop() -> MethodInfo {
    method(
        method_ref("Test", "count", "(I)I"),
        MethodAccessFlags::STATIC,
        2,
        2,
        &[
            IConst0,
            IStore1,
            ILoad1,
            ILoad0,
            IfICmpGe { offset: 9 },
            IInc {
                index: 1,
                constant: 1,
            },
            Goto { offset: -8 },
            ILoad1,
            IReturn,
        ],
        Vec::new(),
    )
}

#[test]
fn osr_entry_loads_live_locals() {
    init_logger();
    let runtime = InMemoryRuntime::new();
    let graph = GraphBuilder::new(&runtime)
        .with_osr(ProgramCounter::from(2))
        .build(&counting_loop())
        .expect("Fail to build");
    let osr = graph.osr_entry().expect("No OSR entry");
    let osr_block = graph.block(osr);
    assert!(osr_block.is(BlockFlags::OSR_ENTRY));
    let osr_locals = osr_block
        .instructions
        .iter()
        .filter(|it| matches!(graph.value(**it).instruction, Instruction::OsrLocal { .. }))
        .count();
    assert_eq!(osr_locals, 2);
    assert!(graph.standard_entry().is_some());
    assert!(graph.reachable_blocks().contains(&osr));
}

#[test]
fn literal_translation_keeps_every_node() {
    let method = method(
        method_ref("Test", "sum", "()I"),
        MethodAccessFlags::STATIC,
        2,
        0,
        &[IConst2, IConst3, IAdd, IReturn],
        Vec::new(),
    );
    let graph = method
        .build_graph(
            &InMemoryRuntime::new(),
            &CompilerOptions::without_optimizations(),
        )
        .expect("Fail to build");
    let result = returned_value(&graph).expect("No return value");
    assert!(matches!(
        graph.value(result).instruction,
        Instruction::Arithmetic { .. }
    ));
}

#[test]
#[cfg(feature = "petgraph")]
fn petgraph_traversal_matches_reachable_blocks() {
    use petgraph::visit::Dfs;

    let graph = build(&InMemoryRuntime::new(), &counting_loop()).expect("Fail to build");
    let mut dfs = Dfs::new(&graph, graph.start());
    let mut visited = Vec::new();
    while let Some(block) = dfs.next(&graph) {
        visited.push(block);
    }
    let mut reachable = graph.reachable_blocks();
    visited.sort();
    reachable.sort();
    assert_eq!(visited, reachable);
}
