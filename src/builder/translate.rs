use super::{Bailout, BuildError, Flow, Translator, canonicalizer};
use crate::{
    bytecode::{Decoded, ProgramCounter, RawInstruction, WideInstruction},
    ir::{
        ArithmeticOp, BlockId, CompareOp, Condition, Constant, Conversion, ElementType,
        FrameState, FrameStateError, Instruction, InvokeKind, LogicOp, ShiftOp, Terminator,
        ValueId, ValueKind, frame_state::StackOperations,
    },
    runtime::{FieldInfo, PoolConstant},
    types::{FieldType, PrimitiveType},
};

#[allow(clippy::too_many_lines)]
impl Translator<'_> {
    /// Appends the nodes of one instruction and updates the frame state.
    pub(super) fn translate(&mut self, decoded: &Decoded) -> Result<Flow, BuildError> {
        #[allow(clippy::enum_glob_use)]
        use RawInstruction::*;
        use ValueKind::{Double, Float, Int, Long, Object};

        let insn = &decoded.instruction;
        let opcode = insn.opcode();
        match insn {
            Nop => Ok(Flow::Continue),
            AConstNull => self.constant(Constant::Null),
            IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 => {
                self.constant(Constant::Int(i32::from(opcode) - 3))
            }
            LConst0 | LConst1 => self.constant(Constant::Long(i64::from(opcode) - 9)),
            FConst0 | FConst1 | FConst2 => self.constant(Constant::Float(f32::from(opcode) - 11.0)),
            DConst0 | DConst1 => self.constant(Constant::Double(f64::from(opcode) - 14.0)),
            BiPush { value } => self.constant(Constant::Int(i32::from(*value))),
            SiPush { value } => self.constant(Constant::Int(i32::from(*value))),
            Ldc { index } => self.load_constant(u16::from(*index)),
            LdcW { index } | Ldc2W { index } => self.load_constant(*index),

            ILoad { index } => self.load_local(u16::from(*index), Int),
            LLoad { index } => self.load_local(u16::from(*index), Long),
            FLoad { index } => self.load_local(u16::from(*index), Float),
            DLoad { index } => self.load_local(u16::from(*index), Double),
            ALoad { index } => self.load_local(u16::from(*index), Object),
            ILoad0 | ILoad1 | ILoad2 | ILoad3 => self.load_local(u16::from(opcode - 0x1A), Int),
            LLoad0 | LLoad1 | LLoad2 | LLoad3 => self.load_local(u16::from(opcode - 0x1E), Long),
            FLoad0 | FLoad1 | FLoad2 | FLoad3 => self.load_local(u16::from(opcode - 0x22), Float),
            DLoad0 | DLoad1 | DLoad2 | DLoad3 => {
                self.load_local(u16::from(opcode - 0x26), Double)
            }
            ALoad0 | ALoad1 | ALoad2 | ALoad3 => {
                self.load_local(u16::from(opcode - 0x2A), Object)
            }
            IALoad => self.load_indexed(ElementType::Int, Int),
            LALoad => self.load_indexed(ElementType::Long, Long),
            FALoad => self.load_indexed(ElementType::Float, Float),
            DALoad => self.load_indexed(ElementType::Double, Double),
            AALoad => self.load_indexed(ElementType::Object, Object),
            BALoad => self.load_indexed(ElementType::Byte, Int),
            CALoad => self.load_indexed(ElementType::Char, Int),
            SALoad => self.load_indexed(ElementType::Short, Int),

            IStore { index } => self.store_local(u16::from(*index), Int),
            LStore { index } => self.store_local(u16::from(*index), Long),
            FStore { index } => self.store_local(u16::from(*index), Float),
            DStore { index } => self.store_local(u16::from(*index), Double),
            AStore { index } => self.store_reference(u16::from(*index)),
            IStore0 | IStore1 | IStore2 | IStore3 => {
                self.store_local(u16::from(opcode - 0x3B), Int)
            }
            LStore0 | LStore1 | LStore2 | LStore3 => {
                self.store_local(u16::from(opcode - 0x3F), Long)
            }
            FStore0 | FStore1 | FStore2 | FStore3 => {
                self.store_local(u16::from(opcode - 0x43), Float)
            }
            DStore0 | DStore1 | DStore2 | DStore3 => {
                self.store_local(u16::from(opcode - 0x47), Double)
            }
            AStore0 | AStore1 | AStore2 | AStore3 => {
                self.store_reference(u16::from(opcode - 0x4B))
            }
            IAStore => self.store_indexed(ElementType::Int, Int),
            LAStore => self.store_indexed(ElementType::Long, Long),
            FAStore => self.store_indexed(ElementType::Float, Float),
            DAStore => self.store_indexed(ElementType::Double, Double),
            AAStore => self.store_indexed(ElementType::Object, Object),
            BAStore => self.store_indexed(ElementType::Byte, Int),
            CAStore => self.store_indexed(ElementType::Char, Int),
            SAStore => self.store_indexed(ElementType::Short, Int),

            Pop => self.stack_operation(StackOperations::pop),
            Pop2 => self.stack_operation(StackOperations::pop2),
            Dup => self.stack_operation(StackOperations::dup),
            DupX1 => self.stack_operation(StackOperations::dup_x1),
            DupX2 => self.stack_operation(StackOperations::dup_x2),
            Dup2 => self.stack_operation(StackOperations::dup2),
            Dup2X1 => self.stack_operation(StackOperations::dup2_x1),
            Dup2X2 => self.stack_operation(StackOperations::dup2_x2),
            Swap => self.stack_operation(StackOperations::swap),

            IAdd => self.arithmetic(ArithmeticOp::Add, Int),
            LAdd => self.arithmetic(ArithmeticOp::Add, Long),
            FAdd => self.arithmetic(ArithmeticOp::Add, Float),
            DAdd => self.arithmetic(ArithmeticOp::Add, Double),
            ISub => self.arithmetic(ArithmeticOp::Sub, Int),
            LSub => self.arithmetic(ArithmeticOp::Sub, Long),
            FSub => self.arithmetic(ArithmeticOp::Sub, Float),
            DSub => self.arithmetic(ArithmeticOp::Sub, Double),
            IMul => self.arithmetic(ArithmeticOp::Mul, Int),
            LMul => self.arithmetic(ArithmeticOp::Mul, Long),
            FMul => self.arithmetic(ArithmeticOp::Mul, Float),
            DMul => self.arithmetic(ArithmeticOp::Mul, Double),
            IDiv => self.arithmetic(ArithmeticOp::Div, Int),
            LDiv => self.arithmetic(ArithmeticOp::Div, Long),
            FDiv => self.arithmetic(ArithmeticOp::Div, Float),
            DDiv => self.arithmetic(ArithmeticOp::Div, Double),
            IRem => self.arithmetic(ArithmeticOp::Rem, Int),
            LRem => self.arithmetic(ArithmeticOp::Rem, Long),
            FRem => self.arithmetic(ArithmeticOp::Rem, Float),
            DRem => self.arithmetic(ArithmeticOp::Rem, Double),
            INeg => self.negate(Int),
            LNeg => self.negate(Long),
            FNeg => self.negate(Float),
            DNeg => self.negate(Double),
            IShl => self.shift(ShiftOp::Shl, Int),
            LShl => self.shift(ShiftOp::Shl, Long),
            IShr => self.shift(ShiftOp::Shr, Int),
            LShr => self.shift(ShiftOp::Shr, Long),
            IUShr => self.shift(ShiftOp::UShr, Int),
            LUShr => self.shift(ShiftOp::UShr, Long),
            IAnd => self.logic(LogicOp::And, Int),
            LAnd => self.logic(LogicOp::And, Long),
            IOr => self.logic(LogicOp::Or, Int),
            LOr => self.logic(LogicOp::Or, Long),
            IXor => self.logic(LogicOp::Xor, Int),
            LXor => self.logic(LogicOp::Xor, Long),
            IInc { index, constant } => self.increment(u16::from(*index), i32::from(*constant)),

            I2L => self.convert(Conversion::I2L, Int, Long),
            I2F => self.convert(Conversion::I2F, Int, Float),
            I2D => self.convert(Conversion::I2D, Int, Double),
            L2I => self.convert(Conversion::L2I, Long, Int),
            L2F => self.convert(Conversion::L2F, Long, Float),
            L2D => self.convert(Conversion::L2D, Long, Double),
            F2I => self.convert(Conversion::F2I, Float, Int),
            F2L => self.convert(Conversion::F2L, Float, Long),
            F2D => self.convert(Conversion::F2D, Float, Double),
            D2I => self.convert(Conversion::D2I, Double, Int),
            D2L => self.convert(Conversion::D2L, Double, Long),
            D2F => self.convert(Conversion::D2F, Double, Float),
            I2B => self.convert(Conversion::I2B, Int, Int),
            I2C => self.convert(Conversion::I2C, Int, Int),
            I2S => self.convert(Conversion::I2S, Int, Int),
            LCmp => self.compare(CompareOp::LCmp, Long),
            FCmpL => self.compare(CompareOp::FCmpL, Float),
            FCmpG => self.compare(CompareOp::FCmpG, Float),
            DCmpL => self.compare(CompareOp::DCmpL, Double),
            DCmpG => self.compare(CompareOp::DCmpG, Double),

            IfEq { offset } => self.if_zero(decoded, *offset, Condition::Equal),
            IfNe { offset } => self.if_zero(decoded, *offset, Condition::NotEqual),
            IfLt { offset } => self.if_zero(decoded, *offset, Condition::LessThan),
            IfGe { offset } => self.if_zero(decoded, *offset, Condition::GreaterOrEqual),
            IfGt { offset } => self.if_zero(decoded, *offset, Condition::GreaterThan),
            IfLe { offset } => self.if_zero(decoded, *offset, Condition::LessOrEqual),
            IfICmpEq { offset } => self.if_same(decoded, *offset, Int, Condition::Equal),
            IfICmpNe { offset } => self.if_same(decoded, *offset, Int, Condition::NotEqual),
            IfICmpLt { offset } => self.if_same(decoded, *offset, Int, Condition::LessThan),
            IfICmpGe { offset } => {
                self.if_same(decoded, *offset, Int, Condition::GreaterOrEqual)
            }
            IfICmpGt { offset } => self.if_same(decoded, *offset, Int, Condition::GreaterThan),
            IfICmpLe { offset } => self.if_same(decoded, *offset, Int, Condition::LessOrEqual),
            IfACmpEq { offset } => self.if_same(decoded, *offset, Object, Condition::Equal),
            IfACmpNe { offset } => self.if_same(decoded, *offset, Object, Condition::NotEqual),
            IfNull { offset } => self.if_null(decoded, *offset, Condition::Equal),
            IfNonNull { offset } => self.if_null(decoded, *offset, Condition::NotEqual),
            Goto { offset } => self.goto(decoded.branch_target(i32::from(*offset))?),
            GotoW { offset } => self.goto(decoded.branch_target(*offset)?),
            Jsr { offset } => {
                self.jsr(decoded.branch_target(i32::from(*offset))?, decoded.next_pc)
            }
            JsrW { offset } => self.jsr(decoded.branch_target(*offset)?, decoded.next_pc),
            Ret { index } => self.ret(u16::from(*index)),
            TableSwitch {
                default,
                low,
                offsets,
                ..
            } => self.table_switch(decoded, *default, *low, offsets),
            LookupSwitch { default, pairs } => self.lookup_switch(decoded, *default, pairs),

            IReturn => self.method_return(Some(Int)),
            LReturn => self.method_return(Some(Long)),
            FReturn => self.method_return(Some(Float)),
            DReturn => self.method_return(Some(Double)),
            AReturn => self.method_return(Some(Object)),
            Return => self.method_return(None),

            GetStatic { index } => self.load_field(*index, true),
            PutStatic { index } => self.store_field(*index, true),
            GetField { index } => self.load_field(*index, false),
            PutField { index } => self.store_field(*index, false),
            InvokeVirtual { index } => self.invoke(InvokeKind::Virtual, *index, decoded.next_pc),
            InvokeSpecial { index } => self.invoke(InvokeKind::Special, *index, decoded.next_pc),
            InvokeStatic { index } => self.invoke(InvokeKind::Static, *index, decoded.next_pc),
            InvokeInterface { index, .. } => {
                self.invoke(InvokeKind::Interface, *index, decoded.next_pc)
            }
            InvokeDynamic { .. } => Err(Bailout::UnsupportedBytecode {
                pc: decoded.pc,
                opcode,
            }
            .into()),

            New { index } => self.new_instance(*index),
            NewArray { atype } => self.new_type_array(*atype, opcode),
            ANewArray { index } => self.new_object_array(*index),
            MultiANewArray { index, dimensions } => self.new_multi_array(*index, *dimensions),
            ArrayLength => {
                let array = self.state.pop_kind(Object)?;
                self.push_new(Int, Instruction::ArrayLength { array })
            }
            AThrow => {
                let exception = self.state.pop_kind(Object)?;
                self.throw(exception)
            }
            CheckCast { index } => {
                let target = self.lookup_type(*index)?;
                let object = self.state.pop_kind(Object)?;
                self.push_new(Object, Instruction::CheckCast { target, object })
            }
            InstanceOf { index } => {
                let target = self.lookup_type(*index)?;
                let object = self.state.pop_kind(Object)?;
                self.push_new(Int, Instruction::InstanceOf { target, object })
            }
            MonitorEnter => self.monitor_enter(),
            MonitorExit => self.monitor_exit(),
            Wide(wide) => self.translate_wide(wide),
        }
    }

    fn translate_wide(&mut self, wide: &WideInstruction) -> Result<Flow, BuildError> {
        use ValueKind::{Double, Float, Int, Long, Object};

        match wide {
            WideInstruction::ILoad { index } => self.load_local(*index, Int),
            WideInstruction::LLoad { index } => self.load_local(*index, Long),
            WideInstruction::FLoad { index } => self.load_local(*index, Float),
            WideInstruction::DLoad { index } => self.load_local(*index, Double),
            WideInstruction::ALoad { index } => self.load_local(*index, Object),
            WideInstruction::IStore { index } => self.store_local(*index, Int),
            WideInstruction::LStore { index } => self.store_local(*index, Long),
            WideInstruction::FStore { index } => self.store_local(*index, Float),
            WideInstruction::DStore { index } => self.store_local(*index, Double),
            WideInstruction::AStore { index } => self.store_reference(*index),
            WideInstruction::IInc { index, constant } => {
                self.increment(*index, i32::from(*constant))
            }
            WideInstruction::Ret { index } => self.ret(*index),
        }
    }

    fn constant(&mut self, constant: Constant) -> Result<Flow, BuildError> {
        self.push_constant(constant)?;
        Ok(Flow::Continue)
    }

    fn load_constant(&mut self, index: u16) -> Result<Flow, BuildError> {
        let constant = self
            .constant_pool(index)?
            .lookup_constant(index)
            .ok_or_else(|| self.unresolvable(index))?;
        let constant = match constant {
            PoolConstant::Integer(it) => Constant::Int(it),
            PoolConstant::Long(it) => Constant::Long(it),
            PoolConstant::Float(it) => Constant::Float(it),
            PoolConstant::Double(it) => Constant::Double(it),
            PoolConstant::String(it) => Constant::String(it),
            PoolConstant::Class(it) => Constant::Class(it),
        };
        self.constant(constant)
    }

    /// Appends `instruction` and pushes its result.
    fn push_new(&mut self, kind: ValueKind, instruction: Instruction) -> Result<Flow, BuildError> {
        let value = self.append(kind, instruction)?;
        self.state.push(value, kind)?;
        Ok(Flow::Continue)
    }

    fn load_local(&mut self, index: u16, kind: ValueKind) -> Result<Flow, BuildError> {
        let value = self.state.load_local(index, kind)?;
        self.state.push(value, kind)?;
        Ok(Flow::Continue)
    }

    fn store_local(&mut self, index: u16, kind: ValueKind) -> Result<Flow, BuildError> {
        let value = self.state.pop_kind(kind)?;
        self.check_local_store(index, kind)?;
        self.state.store_local(index, value, kind)?;
        Ok(Flow::Continue)
    }

    /// `astore`, which also stores the return addresses of subroutines.
    fn store_reference(&mut self, index: u16) -> Result<Flow, BuildError> {
        let (value, kind) = self.state.pop_object_or_address()?;
        self.check_local_store(index, kind)?;
        self.state.store_local(index, value, kind)?;
        Ok(Flow::Continue)
    }

    fn load_indexed(&mut self, element: ElementType, kind: ValueKind) -> Result<Flow, BuildError> {
        let index = self.state.pop_kind(ValueKind::Int)?;
        let array = self.state.pop_kind(ValueKind::Object)?;
        self.push_new(
            kind,
            Instruction::LoadIndexed {
                array,
                index,
                element,
            },
        )
    }

    fn store_indexed(
        &mut self,
        element: ElementType,
        kind: ValueKind,
    ) -> Result<Flow, BuildError> {
        let value = self.state.pop_kind(kind)?;
        let index = self.state.pop_kind(ValueKind::Int)?;
        let array = self.state.pop_kind(ValueKind::Object)?;
        self.memory_map.escape(value);
        self.append(
            ValueKind::Void,
            Instruction::StoreIndexed {
                array,
                index,
                value,
                element,
            },
        )?;
        Ok(Flow::Continue)
    }

    fn stack_operation<F>(&mut self, operation: F) -> Result<Flow, BuildError>
    where
        F: FnOnce(&mut FrameState) -> Result<(), FrameStateError>,
    {
        operation(&mut self.state)?;
        Ok(Flow::Continue)
    }

    fn arithmetic(&mut self, op: ArithmeticOp, kind: ValueKind) -> Result<Flow, BuildError> {
        let y = self.state.pop_kind(kind)?;
        let x = self.state.pop_kind(kind)?;
        self.push_new(kind, Instruction::Arithmetic { op, x, y })
    }

    fn logic(&mut self, op: LogicOp, kind: ValueKind) -> Result<Flow, BuildError> {
        let y = self.state.pop_kind(kind)?;
        let x = self.state.pop_kind(kind)?;
        self.push_new(kind, Instruction::Logic { op, x, y })
    }

    fn shift(&mut self, op: ShiftOp, kind: ValueKind) -> Result<Flow, BuildError> {
        let y = self.state.pop_kind(ValueKind::Int)?;
        let x = self.state.pop_kind(kind)?;
        self.push_new(kind, Instruction::Shift { op, x, y })
    }

    fn negate(&mut self, kind: ValueKind) -> Result<Flow, BuildError> {
        let x = self.state.pop_kind(kind)?;
        self.push_new(kind, Instruction::Negate { x })
    }

    fn convert(
        &mut self,
        op: Conversion,
        from: ValueKind,
        to: ValueKind,
    ) -> Result<Flow, BuildError> {
        let x = self.state.pop_kind(from)?;
        self.push_new(to, Instruction::Convert { op, x })
    }

    fn compare(&mut self, op: CompareOp, kind: ValueKind) -> Result<Flow, BuildError> {
        let y = self.state.pop_kind(kind)?;
        let x = self.state.pop_kind(kind)?;
        self.push_new(ValueKind::Int, Instruction::Compare { op, x, y })
    }

    fn increment(&mut self, index: u16, constant: i32) -> Result<Flow, BuildError> {
        let x = self.state.load_local(index, ValueKind::Int)?;
        let y = self.append_constant(Constant::Int(constant))?;
        let sum = self.append(
            ValueKind::Int,
            Instruction::Arithmetic {
                op: ArithmeticOp::Add,
                x,
                y,
            },
        )?;
        self.check_local_store(index, ValueKind::Int)?;
        self.state.store_local(index, sum, ValueKind::Int)?;
        Ok(Flow::Continue)
    }

    fn if_zero(
        &mut self,
        decoded: &Decoded,
        offset: i16,
        condition: Condition,
    ) -> Result<Flow, BuildError> {
        let x = self.state.pop_kind(ValueKind::Int)?;
        let y = self.append_constant(Constant::Int(0))?;
        self.branch(decoded, offset, x, condition, y)
    }

    fn if_null(
        &mut self,
        decoded: &Decoded,
        offset: i16,
        condition: Condition,
    ) -> Result<Flow, BuildError> {
        let x = self.state.pop_kind(ValueKind::Object)?;
        let y = self.append_constant(Constant::Null)?;
        self.branch(decoded, offset, x, condition, y)
    }

    fn if_same(
        &mut self,
        decoded: &Decoded,
        offset: i16,
        kind: ValueKind,
        condition: Condition,
    ) -> Result<Flow, BuildError> {
        let y = self.state.pop_kind(kind)?;
        let x = self.state.pop_kind(kind)?;
        self.branch(decoded, offset, x, condition, y)
    }

    /// Ends the block with a two-way branch, or with a jump if the condition is constant.
    fn branch(
        &mut self,
        decoded: &Decoded,
        offset: i16,
        x: ValueId,
        condition: Condition,
        y: ValueId,
    ) -> Result<Flow, BuildError> {
        let target = decoded.branch_target(i32::from(offset))?;
        let top = self.top();
        let backward = target < decoded.pc;
        let folded = if self.options.canonicalize {
            canonicalizer::fold_condition(&self.graph, x, condition, y)
        } else {
            None
        };
        if let Some(taken) = folded {
            let successor = self.block_at(top, if taken { target } else { decoded.next_pc })?;
            return self.end_block(Terminator::Goto {
                successor,
                safepoint: backward && taken,
            });
        }
        let true_successor = self.block_at(top, target)?;
        let false_successor = self.block_at(top, decoded.next_pc)?;
        self.end_block(Terminator::If {
            x,
            condition,
            y,
            true_successor,
            false_successor,
            backward,
        })
    }

    fn goto(&mut self, target: ProgramCounter) -> Result<Flow, BuildError> {
        let top = self.top();
        let successor = self.block_at(top, target)?;
        self.end_block(Terminator::Goto {
            successor,
            safepoint: target <= self.bci,
        })
    }

    fn table_switch(
        &mut self,
        decoded: &Decoded,
        default: i32,
        low: i32,
        offsets: &[i32],
    ) -> Result<Flow, BuildError> {
        let value = self.state.pop_kind(ValueKind::Int)?;
        let case = self.switch_constant(value).map(|key| {
            usize::try_from(i64::from(key) - i64::from(low))
                .ok()
                .filter(|it| *it < offsets.len())
                .unwrap_or(offsets.len())
        });
        self.switch(decoded, value, default, offsets, case, |value, successors, backward| {
            Terminator::TableSwitch {
                value,
                low,
                successors,
                backward,
            }
        })
    }

    fn lookup_switch(
        &mut self,
        decoded: &Decoded,
        default: i32,
        pairs: &[(i32, i32)],
    ) -> Result<Flow, BuildError> {
        let value = self.state.pop_kind(ValueKind::Int)?;
        let (keys, offsets): (Vec<_>, Vec<_>) = pairs.iter().copied().unzip();
        let case = self.switch_constant(value).map(|key| {
            keys.iter()
                .position(|it| *it == key)
                .unwrap_or(keys.len())
        });
        self.switch(decoded, value, default, &offsets, case, |value, successors, backward| {
            Terminator::LookupSwitch {
                value,
                keys,
                successors,
                backward,
            }
        })
    }

    fn switch_constant(&self, value: ValueId) -> Option<i32> {
        if !self.options.canonicalize {
            return None;
        }
        match self.constant_of(value) {
            Some(Constant::Int(key)) => Some(*key),
            _ => None,
        }
    }

    /// Ends the block with a switch over `offsets` followed by `default`, or with a jump to
    /// the successor at `case` if the switched value is constant.
    fn switch<F>(
        &mut self,
        decoded: &Decoded,
        value: ValueId,
        default: i32,
        offsets: &[i32],
        case: Option<usize>,
        terminator: F,
    ) -> Result<Flow, BuildError>
    where
        F: FnOnce(ValueId, Vec<BlockId>, bool) -> Terminator,
    {
        let top = self.top();
        let all_offsets: Vec<_> = offsets.iter().copied().chain([default]).collect();
        let backward = all_offsets.iter().any(|it| *it < 0);
        let mut successors = Vec::with_capacity(all_offsets.len());
        for offset in &all_offsets {
            let target = decoded.branch_target(*offset)?;
            successors.push(self.block_at(top, target)?);
        }
        if let Some(case) = case {
            let offset = all_offsets[case];
            return self.end_block(Terminator::Goto {
                successor: successors[case],
                safepoint: offset < 0,
            });
        }
        self.end_block(terminator(value, successors, backward))
    }

    fn load_field(&mut self, index: u16, is_static: bool) -> Result<Flow, BuildError> {
        let field = self.lookup_field(index)?;
        let info = self.runtime.resolve_field(&field);
        let kind = ValueKind::from(&field.field_type);
        let object = if is_static {
            None
        } else {
            Some(self.state.pop_kind(ValueKind::Object)?)
        };
        let resolved = info.is_some();
        let volatile = info.is_some_and(FieldInfo::is_volatile);
        let tracked = self.options.eliminate_field_access && resolved && !volatile;
        if tracked {
            if let Some(known) = self.memory_map.load(object, &field) {
                self.state.push(known, kind)?;
                return Ok(Flow::Continue);
            }
        }
        let value = self.append(
            kind,
            Instruction::LoadField {
                object,
                field: field.clone(),
                resolved,
            },
        )?;
        if tracked {
            self.memory_map.record_load(object, &field, value);
        } else if !resolved || volatile {
            self.value_map.kill();
            self.memory_map.kill();
        }
        self.state.push(value, kind)?;
        Ok(Flow::Continue)
    }

    fn store_field(&mut self, index: u16, is_static: bool) -> Result<Flow, BuildError> {
        let field = self.lookup_field(index)?;
        let info = self.runtime.resolve_field(&field);
        let value = self.state.pop_typed(&field.field_type)?;
        let object = if is_static {
            None
        } else {
            Some(self.state.pop_kind(ValueKind::Object)?)
        };
        let resolved = info.is_some();
        let volatile = info.is_some_and(FieldInfo::is_volatile);
        let tracked = self.options.eliminate_field_access && resolved && !volatile;
        if tracked {
            let default = self.constant_of(value).is_some_and(is_default_value);
            if self.memory_map.store(object, &field, value, default) {
                log::trace!("Eliminated redundant store to {field} at {}", self.bci);
                return Ok(Flow::Continue);
            }
        } else {
            self.memory_map.escape(value);
        }
        self.append(
            ValueKind::Void,
            Instruction::StoreField {
                object,
                field,
                value,
                resolved,
            },
        )?;
        if !resolved || volatile {
            self.value_map.kill();
            self.memory_map.kill();
        }
        Ok(Flow::Continue)
    }

    fn new_instance(&mut self, index: u16) -> Result<Flow, BuildError> {
        let FieldType::Object(class) = self.lookup_type(index)? else {
            return Err(self.unresolvable(index));
        };
        let object = self.append(ValueKind::Object, Instruction::NewInstance { class })?;
        self.memory_map.new_instance(object);
        self.state.push(object, ValueKind::Object)?;
        Ok(Flow::Continue)
    }

    fn new_type_array(&mut self, atype: u8, opcode: u8) -> Result<Flow, BuildError> {
        let Some(element) = PrimitiveType::from_array_type_code(atype) else {
            return Err(Bailout::UnsupportedBytecode {
                pc: self.bci,
                opcode,
            }
            .into());
        };
        let length = self.state.pop_kind(ValueKind::Int)?;
        self.push_new(ValueKind::Object, Instruction::NewTypeArray { element, length })
    }

    fn new_object_array(&mut self, index: u16) -> Result<Flow, BuildError> {
        let element = self.lookup_type(index)?;
        let length = self.state.pop_kind(ValueKind::Int)?;
        self.push_new(ValueKind::Object, Instruction::NewObjectArray { element, length })
    }

    fn new_multi_array(&mut self, index: u16, dimensions: u8) -> Result<Flow, BuildError> {
        let array_type = self.lookup_type(index)?;
        let mut lengths = (0..dimensions)
            .map(|_| self.state.pop_kind(ValueKind::Int))
            .collect::<Result<Vec<_>, _>>()?;
        lengths.reverse();
        self.push_new(
            ValueKind::Object,
            Instruction::NewMultiArray {
                array_type,
                dimensions: lengths,
            },
        )
    }

    fn monitor_enter(&mut self) -> Result<Flow, BuildError> {
        let object = self.state.pop_kind(ValueKind::Object)?;
        let lock = self.state.locks().len() + 1;
        self.append(ValueKind::Void, Instruction::MonitorEnter { object, lock })?;
        self.state.lock(object);
        Ok(Flow::Continue)
    }

    fn monitor_exit(&mut self) -> Result<Flow, BuildError> {
        let object = self.state.pop_kind(ValueKind::Object)?;
        let lock = self.state.locks().len();
        if lock == 0 {
            Err(Bailout::MonitorStackUnderflow(self.bci))?;
        }
        self.append(ValueKind::Void, Instruction::MonitorExit { object, lock })?;
        self.state
            .unlock()
            .map_err(|_| Bailout::MonitorStackUnderflow(self.bci))?;
        Ok(Flow::Continue)
    }
}

fn is_default_value(constant: &Constant) -> bool {
    match constant {
        Constant::Int(it) => *it == 0,
        Constant::Long(it) => *it == 0,
        Constant::Float(it) => it.to_bits() == 0,
        Constant::Double(it) => it.to_bits() == 0,
        Constant::Null => true,
        Constant::String(_) | Constant::Class(_) | Constant::ReturnAddress(_) => false,
    }
}
