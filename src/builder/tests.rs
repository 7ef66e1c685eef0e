use proptest::prelude::*;

use super::*;
use crate::{
    bytecode::RawInstruction::{self, *},
    ir::{ArithmeticOp, Block, InvokeKind},
    runtime::{
        ExceptionHandler, FieldAccessFlags, FieldInfo, InMemoryRuntime, MethodAccessFlags,
        TypeInfo,
    },
    tests::{init_logger, method_ref, static_method, test_method},
    types::{ClassRef, PrimitiveType},
};

fn build(runtime: &InMemoryRuntime, method: &MethodInfo) -> Result<IrGraph, BuildError> {
    init_logger();
    GraphBuilder::new(runtime).build(method)
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

fn count_nodes(graph: &IrGraph, predicate: impl Fn(&Instruction) -> bool) -> usize {
    graph
        .instructions()
        .filter(|(_, value)| predicate(&value.instruction))
        .count()
}

fn block_at(graph: &IrGraph, bci: u16) -> &Block {
    graph
        .blocks()
        .iter()
        .find(|it| it.bci == ProgramCounter::from(bci) && it.state_before.is_some())
        .expect("No block at the given bci")
}

fn test_class() -> ClassRef {
    ClassRef::new("Test")
}

fn runtime_with_field(flags: FieldAccessFlags) -> (InMemoryRuntime, u16) {
    let mut runtime = InMemoryRuntime::new();
    let field = FieldRef {
        owner: test_class(),
        name: "f".to_owned(),
        field_type: FieldType::Base(PrimitiveType::Int),
    };
    let index = runtime.pool_mut(&test_class()).add_field(field.clone());
    runtime.add_field(FieldInfo {
        field,
        access_flags: flags,
    });
    (runtime, index)
}

#[test]
fn straight_line() {
    let method = static_method("(I)I", 2, 1, &[ILoad0, IConst1, IAdd, IReturn]);
    let graph = build(&InMemoryRuntime::new(), &method).expect("Fail to build");
    assert_eq!(graph.reachable_blocks().len(), 2);
    assert_eq!(graph.standard_entry().map(|it| graph.block(it).bci), Some(ProgramCounter::ZERO));
    let result = returned_value(&graph).expect("No return value");
    let Instruction::Arithmetic { op, x, .. } = graph.value(result).instruction else {
        panic!("Not an addition");
    };
    assert_eq!(op, ArithmeticOp::Add);
    assert!(matches!(
        graph.value(x).instruction,
        Instruction::Local { index: 0, .. }
    ));
}

#[test]
fn stored_constant_is_returned() {
    let method = static_method("()I", 1, 2, &[IConst0, IStore1, ILoad1, IReturn]);
    let graph = build(&InMemoryRuntime::new(), &method).expect("Fail to build");
    assert_eq!(graph.reachable_blocks().len(), 2);
    assert!(
        !graph
            .blocks()
            .iter()
            .any(|it| it.is(BlockFlags::LOOP_HEADER))
    );
    let result = returned_value(&graph).expect("No return value");
    assert_eq!(
        graph.value(result).instruction,
        Instruction::Constant(Constant::Int(0))
    );
}

proptest! {

    #[test]
    fn constant_arithmetic_folds(a in any::<i16>(), b in any::<i16>()) {
        let method = static_method(
            "()I",
            2,
            0,
            &[SiPush { value: a }, SiPush { value: b }, IAdd, IReturn],
        );
        let graph = build(&InMemoryRuntime::new(), &method).expect("Fail to build");
        let result = returned_value(&graph).expect("No return value");
        prop_assert!(matches!(
            &graph.value(result).instruction,
            Instruction::Constant(Constant::Int(it)) if *it == i32::from(a) + i32::from(b)
        ));
    }
}

#[test]
fn constants_are_numbered() {
    let method = static_method("()I", 2, 0, &[IConst2, IConst2, IMul, IReturn]);
    let options = CompilerOptions {
        canonicalize: false,
        ..CompilerOptions::default()
    };
    let graph = GraphBuilder::new(&InMemoryRuntime::new())
        .with_options(options)
        .build(&method)
        .expect("Fail to build");
    let result = returned_value(&graph).expect("No return value");
    let Instruction::Arithmetic { x, y, .. } = graph.value(result).instruction else {
        panic!("Not a multiplication");
    };
    assert_eq!(x, y);
}

/// `int i = 0; while (i < n) i++; return i;`
fn counting_loop() -> MethodInfo {
    static_method(
        "(I)I",
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
    )
}

#[test]
fn loop_header_has_phis_for_stored_locals() {
    let graph = build(&InMemoryRuntime::new(), &counting_loop()).expect("Fail to build");
    let header = block_at(&graph, 2);
    assert!(header.is(BlockFlags::LOOP_HEADER));
    let state = header.state_before.as_ref().expect("No entry state");
    let Some(counter) = state.locals()[1].value() else {
        panic!("The counter is not live");
    };
    assert_eq!(graph.phi_operands(counter).len(), 2);
    let Some(bound) = state.locals()[0].value() else {
        panic!("The bound is not live");
    };
    assert!(matches!(
        graph.value(bound).instruction,
        Instruction::Local { index: 0, .. }
    ));

    let Some(Terminator::If { x, backward, .. }) =
        block_at(&graph, 2).end.as_ref().map(|it| &it.terminator)
    else {
        panic!("The header does not end with a branch");
    };
    assert_eq!(*x, counter);
    assert!(!backward);
}

#[test]
fn imprecise_loop_stores() {
    let options = CompilerOptions {
        precise_loop_stores: false,
        ..CompilerOptions::default()
    };
    let graph = GraphBuilder::new(&InMemoryRuntime::new())
        .with_options(options)
        .build(&counting_loop())
        .expect("Fail to build");
    let state = block_at(&graph, 2)
        .state_before
        .as_ref()
        .expect("No entry state");
    let Some(bound) = state.locals()[0].value() else {
        panic!("The bound is not live");
    };
    assert_eq!(graph.phi_operands(bound).len(), 1);
}

#[test]
fn back_edge_is_a_safepoint() {
    let graph = build(&InMemoryRuntime::new(), &counting_loop()).expect("Fail to build");
    let safepoints = graph
        .reachable_blocks()
        .into_iter()
        .filter(|it| {
            matches!(
                graph.block(*it).end.as_ref().map(|end| &end.terminator),
                Some(Terminator::Goto {
                    safepoint: true,
                    ..
                })
            )
        })
        .count();
    assert_eq!(safepoints, 1);
}

#[test]
fn handler_predecessor_is_listed_once() {
    let method = test_method(
        "test",
        "([I)I",
        MethodAccessFlags::STATIC,
        2,
        1,
        &[
            ALoad0, ArrayLength, ALoad0, IConst0, IALoad, IAdd, IReturn, Pop, IConst0, IReturn,
        ],
        ExceptionHandler::from_table_entry(0, 7, 7, None)
            .into_iter()
            .collect(),
    );
    let graph = build(&InMemoryRuntime::new(), &method).expect("Fail to build");
    let entry = graph.standard_entry().expect("No standard entry");
    let handler = block_at(&graph, 7);
    assert!(handler.is(BlockFlags::EXCEPTION_ENTRY));
    assert_eq!(handler.predecessors, vec![entry]);
    assert_eq!(graph.block(entry).exception_handlers, vec![handler.id]);
    let first = handler.instructions.first().copied().expect("Empty handler");
    assert_eq!(graph.value(first).instruction, Instruction::ExceptionObject);
}

#[test]
fn floating_point_division_does_not_reach_the_handler() {
    let method = test_method(
        "test",
        "(IIF)F",
        MethodAccessFlags::STATIC,
        2,
        4,
        &[
            ILoad0,
            ILoad1,
            IDiv,
            Pop,
            Goto { offset: 3 },
            FLoad2,
            FLoad2,
            FDiv,
            FStore2,
            Goto { offset: 3 },
            FLoad2,
            FReturn,
            AStore3,
            FConst0,
            FReturn,
        ],
        ExceptionHandler::from_table_entry(0, 14, 16, None)
            .into_iter()
            .collect(),
    );
    let graph = build(&InMemoryRuntime::new(), &method).expect("Fail to build");
    let entry = graph.standard_entry().expect("No standard entry");
    let handler = block_at(&graph, 16);
    assert_eq!(handler.predecessors, vec![entry]);
    assert!(block_at(&graph, 7).exception_handlers.is_empty());
    let (_, division) = graph
        .instructions()
        .find(|(_, value)| {
            value.kind == ValueKind::Float
                && matches!(
                    value.instruction,
                    Instruction::Arithmetic {
                        op: ArithmeticOp::Div,
                        ..
                    }
                )
        })
        .expect("No float division");
    assert!(division.state_before.is_none());
}

#[test]
fn redundant_store_is_dropped() {
    let (runtime, index) = runtime_with_field(FieldAccessFlags::PRIVATE);
    let body = [
        ALoad0,
        IConst1,
        PutField { index },
        ALoad0,
        IConst1,
        PutField { index },
        Return,
    ];
    let method = test_method("m", "()V", MethodAccessFlags::PUBLIC, 2, 1, &body, Vec::new());
    let graph = build(&runtime, &method).expect("Fail to build");
    assert_eq!(
        count_nodes(&graph, |it| matches!(it, Instruction::StoreField { .. })),
        1
    );
}

#[test]
fn volatile_stores_are_kept() {
    let (runtime, index) =
        runtime_with_field(FieldAccessFlags::PRIVATE | FieldAccessFlags::VOLATILE);
    let body = [
        ALoad0,
        IConst1,
        PutField { index },
        ALoad0,
        IConst1,
        PutField { index },
        Return,
    ];
    let method = test_method("m", "()V", MethodAccessFlags::PUBLIC, 2, 1, &body, Vec::new());
    let graph = build(&runtime, &method).expect("Fail to build");
    assert_eq!(
        count_nodes(&graph, |it| matches!(it, Instruction::StoreField { .. })),
        2
    );
}

/// Constant pool indices used by [`with_fresh_object`].
struct FreshObject {
    class: u16,
    field: u16,
    sink: u16,
}

/// Prefixes the body with `new Test; astore_0`. `Test.f` is an `int` and `Test.sink` is a
/// static field of type `Test`.
fn with_fresh_object(
    body: impl FnOnce(&FreshObject) -> Vec<RawInstruction>,
) -> (InMemoryRuntime, MethodInfo) {
    let (mut runtime, field) = runtime_with_field(FieldAccessFlags::PRIVATE);
    let sink = FieldRef {
        owner: test_class(),
        name: "sink".to_owned(),
        field_type: FieldType::Object(test_class()),
    };
    let pool = runtime.pool_mut(&test_class());
    let indices = FreshObject {
        class: pool.add_type(FieldType::Object(test_class())),
        field,
        sink: pool.add_field(sink.clone()),
    };
    runtime.add_field(FieldInfo {
        field: sink,
        access_flags: FieldAccessFlags::PRIVATE | FieldAccessFlags::STATIC,
    });
    let code: Vec<_> = [New { index: indices.class }, AStore0]
        .into_iter()
        .chain(body(&indices))
        .collect();
    let method = test_method("m", "()V", MethodAccessFlags::STATIC, 3, 1, &code, Vec::new());
    (runtime, method)
}

fn stores_to_f(graph: &IrGraph) -> usize {
    count_nodes(
        graph,
        |it| matches!(it, Instruction::StoreField { field, .. } if field.name == "f"),
    )
}

#[test]
fn repeated_store_to_fresh_object_is_dropped() {
    let (runtime, method) = with_fresh_object(|it| {
        vec![
            ALoad0,
            IConst1,
            PutField { index: it.field },
            ALoad0,
            IConst1,
            PutField { index: it.field },
            Return,
        ]
    });
    let graph = build(&runtime, &method).expect("Fail to build");
    assert_eq!(stores_to_f(&graph), 1);
}

#[test]
fn default_store_to_fresh_object_is_dropped() {
    let (runtime, method) =
        with_fresh_object(|it| vec![ALoad0, IConst0, PutField { index: it.field }, Return]);
    let graph = build(&runtime, &method).expect("Fail to build");
    assert_eq!(stores_to_f(&graph), 0);
    assert_eq!(
        count_nodes(&graph, |it| matches!(it, Instruction::NewInstance { .. })),
        1
    );
}

#[test]
fn escaped_object_keeps_default_store() {
    let escapes: [fn(&FreshObject) -> Vec<RawInstruction>; 2] = [
        |it| vec![ALoad0, PutStatic { index: it.sink }],
        |it| {
            vec![
                IConst1,
                ANewArray { index: it.class },
                IConst0,
                ALoad0,
                AAStore,
            ]
        },
    ];
    for escape in escapes {
        let (runtime, method) = with_fresh_object(|it| {
            let mut body = escape(it);
            body.extend([ALoad0, IConst0, PutField { index: it.field }, Return]);
            body
        });
        let graph = build(&runtime, &method).expect("Fail to build");
        assert_eq!(stores_to_f(&graph), 1);
    }
}

#[test]
fn load_after_store_uses_stored_value() {
    let (runtime, index) = runtime_with_field(FieldAccessFlags::PRIVATE);
    let body = [
        ALoad0,
        IConst5,
        PutField { index },
        ALoad0,
        GetField { index },
        IReturn,
    ];
    let method = test_method("m", "()I", MethodAccessFlags::PUBLIC, 2, 1, &body, Vec::new());
    let graph = build(&runtime, &method).expect("Fail to build");
    assert_eq!(
        count_nodes(&graph, |it| matches!(it, Instruction::LoadField { .. })),
        0
    );
    let result = returned_value(&graph).expect("No return value");
    assert_eq!(
        graph.value(result).instruction,
        Instruction::Constant(Constant::Int(5))
    );
}

#[test]
fn folded_table_switch() {
    let method = static_method(
        "()I",
        1,
        0,
        &[
            IConst1,
            TableSwitch {
                default: 27,
                low: 0,
                high: 1,
                offsets: vec![23, 25],
            },
            IConst0,
            IReturn,
            IConst1,
            IReturn,
            IConst2,
            IReturn,
        ],
    );
    let graph = build(&InMemoryRuntime::new(), &method).expect("Fail to build");
    assert_eq!(graph.reachable_blocks().len(), 3);
    let result = returned_value(&graph).expect("No return value");
    assert_eq!(
        graph.value(result).instruction,
        Instruction::Constant(Constant::Int(1))
    );
}

#[test]
fn subroutine_is_inlined() {
    let method = static_method(
        "()V",
        1,
        1,
        &[Jsr { offset: 4 }, Return, AStore0, Ret { index: 0 }],
    );
    let graph = build(&InMemoryRuntime::new(), &method).expect("Fail to build");
    let blocks = graph.reachable_blocks();
    assert!(
        blocks
            .iter()
            .any(|it| graph.block(*it).is(BlockFlags::SUBROUTINE_ENTRY))
    );
    assert!(returned_value(&graph).is_none());
    assert!(blocks.iter().any(|it| matches!(
        graph.block(*it).end.as_ref().map(|end| &end.terminator),
        Some(Terminator::Return { value: None })
    )));
}

#[test]
fn bailouts() {
    let runtime = InMemoryRuntime::new();
    let cases: Vec<(MethodInfo, Bailout)> = vec![
        (
            static_method("()V", 1, 0, &[InvokeDynamic { index: 1 }, Return]),
            Bailout::UnsupportedBytecode {
                pc: ProgramCounter::ZERO,
                opcode: 0xBA,
            },
        ),
        (
            static_method("(Ljava/lang/Object;)V", 1, 1, &[ALoad0, MonitorExit, Return]),
            Bailout::MonitorStackUnderflow(ProgramCounter::from(1)),
        ),
        (
            static_method("()V", 1, 1, &[Ret { index: 0 }]),
            Bailout::RetOutsideSubroutine(ProgramCounter::ZERO),
        ),
        (
            static_method(
                "()V",
                1,
                1,
                &[Jsr { offset: 4 }, Return, Jsr { offset: 0 }, Return],
            ),
            Bailout::RecursiveJsr(ProgramCounter::from(4)),
        ),
        (
            static_method(
                "()V",
                1,
                1,
                &[
                    Jsr { offset: 4 },
                    Return,
                    AStore0,
                    Jsr { offset: 5 },
                    Ret { index: 0 },
                    AStore0,
                    Ret { index: 0 },
                ],
            ),
            Bailout::ReturnAddressConflict {
                pc: ProgramCounter::from(10),
                local: 0,
            },
        ),
    ];
    for (method, expected) in cases {
        let error = build(&runtime, &method).expect_err("Should bail out");
        assert_eq!(error.as_bailout(), Some(&expected));
    }
}

#[test]
fn osr_entry_with_values_on_the_stack() {
    init_logger();
    let method = static_method("()I", 1, 0, &[IConst1, Goto { offset: 3 }, IReturn]);
    let error = GraphBuilder::new(&InMemoryRuntime::new())
        .with_osr(ProgramCounter::from(4))
        .build(&method)
        .expect_err("Should bail out");
    assert_eq!(
        error,
        BuildError::Bailout(Bailout::OsrWithNonEmptyStack(ProgramCounter::from(4)))
    );
}

#[test]
fn static_call_to_instance_method() {
    let mut runtime = InMemoryRuntime::new();
    let target = method_ref("Test", "get", "()I");
    runtime.add_method(MethodInfo::new(
        target.clone(),
        MethodAccessFlags::PUBLIC,
        None,
    ));
    let index = runtime.pool_mut(&test_class()).add_method(target.clone());
    let caller = static_method("()I", 1, 0, &[InvokeStatic { index }, IReturn]);
    let error = build(&runtime, &caller).expect_err("Should bail out");
    assert_eq!(error, BuildError::Bailout(Bailout::LinkError(target)));
}

#[test]
fn too_large() {
    let method = static_method("()I", 3, 0, &[IConst1, IConst2, IConst3, IAdd, IAdd, IReturn]);
    let options = CompilerOptions {
        max_instruction_count: 2,
        ..CompilerOptions::default()
    };
    let error = GraphBuilder::new(&InMemoryRuntime::new())
        .with_options(options)
        .build(&method)
        .expect_err("Should bail out");
    assert_eq!(error, BuildError::Bailout(Bailout::TooLarge));
}

#[test]
fn missing_body() {
    let method = MethodInfo::new(
        method_ref("Test", "m", "()V"),
        MethodAccessFlags::NATIVE,
        None,
    );
    let error = build(&InMemoryRuntime::new(), &method).expect_err("Should bail out");
    assert_eq!(
        error,
        BuildError::Bailout(Bailout::MissingMethodBody(method.method))
    );
}

#[test]
fn synchronized_return_releases_the_monitor() {
    let method = test_method(
        "m",
        "()V",
        MethodAccessFlags::PUBLIC | MethodAccessFlags::SYNCHRONIZED,
        1,
        1,
        &[Return],
        Vec::new(),
    );
    let graph = build(&InMemoryRuntime::new(), &method).expect("Fail to build");
    let exits: Vec<_> = graph
        .instructions()
        .filter_map(|(_, value)| match value.instruction {
            Instruction::MonitorExit { object, lock } => Some((object, lock)),
            _ => None,
        })
        .collect();
    let [(object, 1)] = exits.as_slice() else {
        panic!("Expected a single monitor exit, got {exits:?}");
    };
    assert!(matches!(
        graph.value(*object).instruction,
        Instruction::Local {
            index: 0,
            receiver: true
        }
    ));
}

fn runtime_with_callee(body: &[RawInstruction]) -> (InMemoryRuntime, MethodRef, u16) {
    let mut runtime = InMemoryRuntime::new();
    runtime.add_type(TypeInfo::leaf(
        test_class(),
        Some(ClassRef::new(ClassRef::JAVA_LANG_OBJECT)),
    ));
    let callee = test_method(
        "callee",
        "()I",
        MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC,
        1,
        0,
        body,
        Vec::new(),
    );
    let callee_ref = callee.method.clone();
    runtime.add_method(callee);
    let index = runtime.pool_mut(&test_class()).add_method(callee_ref.clone());
    (runtime, callee_ref, index)
}

#[test]
fn small_static_callee_is_inlined() {
    let (runtime, callee, index) = runtime_with_callee(&[IConst3, IReturn]);
    let caller = static_method("()I", 1, 0, &[InvokeStatic { index }, IReturn]);
    let graph = build(&runtime, &caller).expect("Fail to build");
    assert_eq!(graph.inlined_methods(), &[callee]);
    assert_eq!(
        count_nodes(&graph, |it| matches!(it, Instruction::Invoke { .. })),
        0
    );
    let result = returned_value(&graph).expect("No return value");
    assert_eq!(
        graph.value(result).instruction,
        Instruction::Constant(Constant::Int(3))
    );
}

#[test]
fn forbidden_callee_is_called() {
    let (mut runtime, callee, index) = runtime_with_callee(&[IConst3, IReturn]);
    runtime.forbid_inlining(callee.clone());
    let caller = static_method("()I", 1, 0, &[InvokeStatic { index }, IReturn]);
    let graph = build(&runtime, &caller).expect("Fail to build");
    assert!(graph.inlined_methods().is_empty());
    let result = returned_value(&graph).expect("No return value");
    let Instruction::Invoke {
        kind,
        target,
        resolved,
        ..
    } = &graph.value(result).instruction
    else {
        panic!("Not a call");
    };
    assert_eq!(*kind, InvokeKind::Static);
    assert_eq!(target, &callee);
    assert!(*resolved);
}

#[test]
fn callee_with_branches_joins_at_continuation() {
    let (runtime, callee, index) = runtime_with_callee(&[
        IConst0,
        IfEq { offset: 5 },
        IConst1,
        IReturn,
        IConst2,
        IReturn,
    ]);
    let caller = static_method("()I", 1, 0, &[InvokeStatic { index }, IReturn]);
    let graph = build(&runtime, &caller).expect("Fail to build");
    assert_eq!(graph.inlined_methods(), &[callee]);
    let result = returned_value(&graph).expect("No return value");
    assert_eq!(
        graph.value(result).instruction,
        Instruction::Constant(Constant::Int(2))
    );
}

#[test]
fn builds_are_deterministic() {
    let method = counting_loop();
    let runtime = InMemoryRuntime::new();
    let first = build(&runtime, &method).expect("Fail to build");
    let second = build(&runtime, &method).expect("Fail to build");
    assert_eq!(first, second);
}

#[test]
fn every_block_of_a_loop_is_reachable() {
    let graph = build(&InMemoryRuntime::new(), &counting_loop()).expect("Fail to build");
    for block in graph.reachable_blocks() {
        let block = graph.block(block);
        assert!(block.end.is_some(), "{} has no end", block.id);
        for value in &block.instructions {
            assert_eq!(graph.value(*value).block, Some(block.id));
        }
    }
    assert!(graph.assumptions().is_empty());
}
