//! Field, element and typed-array accesses.
//!
//! Stores compute the write barrier the collector needs for the stored
//! value. LOWER only ever weakens the barrier recorded on the access, and
//! only when the value is known not to need it.

use super::super::selector::RepresentationSelector;
use super::control::is_smi_double;
use super::{truncating_use_for, Rep};
use crate::error::LoweringResult;
use crate::ir::{
    BaseTaggedness, ElementAccess, ExternalArrayType, FieldAccess, NodeId, Operator, Type,
    WriteBarrierKind, MAP_OFFSET,
};
use crate::repr::{MachineType, UseInfo};

/// Typed-array access input layout.
const BUFFER: usize = 0;
const BASE: usize = 1;
const EXTERNAL: usize = 2;
const INDEX: usize = 3;
const VALUE: usize = 4;

/// Write barrier needed to store a value into a field.
///
/// `offset` is the field offset for field stores and `None` for element
/// stores; `value_number` is the value of a number-constant input.
pub fn write_barrier_kind_for(
    base_is_tagged: BaseTaggedness,
    field_rep: Rep,
    offset: Option<u32>,
    field_type: Type,
    value_rep: Rep,
    value_type: Type,
    value_number: Option<f64>,
) -> WriteBarrierKind {
    if base_is_tagged != BaseTaggedness::TaggedBase || !field_rep.can_be_tagged_pointer() {
        return WriteBarrierKind::NoWriteBarrier;
    }
    if offset == Some(MAP_OFFSET) {
        return WriteBarrierKind::MapWriteBarrier;
    }
    if value_rep == Rep::TaggedSigned {
        return WriteBarrierKind::NoWriteBarrier;
    }
    if field_type.is(Type::BOOLEAN_OR_NULL_OR_UNDEFINED)
        || value_type.is(Type::BOOLEAN_OR_NULL_OR_UNDEFINED)
    {
        return WriteBarrierKind::NoWriteBarrier;
    }
    if value_type
        .as_heap_constant()
        .is_some_and(|constant| constant.is_immortal_immovable_root())
    {
        return WriteBarrierKind::NoWriteBarrier;
    }
    if field_rep == Rep::TaggedPointer || value_rep == Rep::TaggedPointer {
        return WriteBarrierKind::PointerWriteBarrier;
    }
    if let Some(value) = value_number {
        // Smis are not pointers; any other number is a fresh heap number.
        return if is_smi_double(value) {
            WriteBarrierKind::NoWriteBarrier
        } else {
            WriteBarrierKind::PointerWriteBarrier
        };
    }
    WriteBarrierKind::FullWriteBarrier
}

/// Representation of a stored value: a tagged field holding only small
/// integers is written as a Smi, which needs no barrier.
fn store_representation(machine_type: MachineType, value_type: Type) -> MachineType {
    if machine_type.representation == Rep::Tagged && value_type.is(Type::SIGNED_SMALL) {
        MachineType::tagged_signed()
    } else {
        machine_type
    }
}

impl RepresentationSelector<'_> {
    fn base_pointer_use(&self, base_is_tagged: BaseTaggedness) -> UseInfo {
        match base_is_tagged {
            BaseTaggedness::TaggedBase => UseInfo::any_tagged(),
            BaseTaggedness::UntaggedBase => UseInfo::word(self.config.pointer_representation),
        }
    }

    /// Barrier for storing value input `index` into a slot of `machine_type`.
    fn store_barrier(
        &self,
        node: NodeId,
        index: usize,
        base_is_tagged: BaseTaggedness,
        machine_type: MachineType,
        offset: Option<u32>,
        field_type: Type,
    ) -> LoweringResult<WriteBarrierKind> {
        let value = self.input(node, index)?;
        Ok(write_barrier_kind_for(
            base_is_tagged,
            machine_type.representation,
            offset,
            field_type,
            self.info(value).representation(),
            self.type_of(value),
            self.graph.op(value).number_value(),
        ))
    }

    // =========================================================================
    // Fields
    // =========================================================================

    pub(super) fn visit_load_field(&mut self, node: NodeId, access: FieldAccess) -> LoweringResult<()> {
        let base = self.base_pointer_use(access.base_is_tagged);
        self.visit_unop(node, base, access.machine_type.representation, Type::ANY)
    }

    pub(super) fn visit_store_field(&mut self, node: NodeId, access: FieldAccess) -> LoweringResult<()> {
        let machine_type = store_representation(access.machine_type, self.input_type(node, 1));

        self.process_input(node, 0, self.base_pointer_use(access.base_is_tagged))?;
        self.process_input(node, 1, truncating_use_for(node, machine_type.representation)?)?;
        self.process_remaining_inputs(node, 2)?;
        self.set_output_rep(node, Rep::None)?;
        if !self.lower() {
            return Ok(());
        }

        let barrier = self.store_barrier(
            node,
            1,
            access.base_is_tagged,
            machine_type,
            Some(access.offset),
            access.ty,
        )?;
        if barrier < access.write_barrier {
            self.stats.write_barriers_elided += 1;
            self.change_op(
                node,
                Operator::StoreField(FieldAccess {
                    machine_type,
                    write_barrier: barrier,
                    ..access
                }),
            );
        }
        Ok(())
    }

    // =========================================================================
    // Elements
    // =========================================================================

    pub(super) fn visit_load_element(&mut self, node: NodeId, access: ElementAccess) -> LoweringResult<()> {
        let base = self.base_pointer_use(access.base_is_tagged);
        self.visit_binop(
            node,
            base,
            UseInfo::truncating_word32(),
            access.machine_type.representation,
            Type::ANY,
        )
    }

    pub(super) fn visit_store_element(&mut self, node: NodeId, access: ElementAccess) -> LoweringResult<()> {
        let machine_type = store_representation(access.machine_type, self.input_type(node, 2));

        self.process_input(node, 0, self.base_pointer_use(access.base_is_tagged))?;
        self.process_input(node, 1, UseInfo::truncating_word32())?;
        self.process_input(node, 2, truncating_use_for(node, machine_type.representation)?)?;
        self.process_remaining_inputs(node, 3)?;
        self.set_output_rep(node, Rep::None)?;
        if !self.lower() {
            return Ok(());
        }

        let barrier = self.store_barrier(node, 2, access.base_is_tagged, machine_type, None, access.ty)?;
        if barrier < access.write_barrier {
            self.stats.write_barriers_elided += 1;
            self.change_op(
                node,
                Operator::StoreElement(ElementAccess {
                    machine_type,
                    write_barrier: barrier,
                    ..access
                }),
            );
        }
        Ok(())
    }

    // =========================================================================
    // Typed Arrays
    // =========================================================================

    /// `LoadTypedElement(buffer, base, external, index)`.
    pub(super) fn visit_load_typed_element(
        &mut self,
        node: NodeId,
        array: ExternalArrayType,
    ) -> LoweringResult<()> {
        self.process_typed_element_address(node)?;
        self.process_remaining_inputs(node, VALUE)?;
        self.set_output_rep(node, array.machine_type().representation)
    }

    /// `StoreTypedElement(buffer, base, external, index, value)`.
    pub(super) fn visit_store_typed_element(
        &mut self,
        node: NodeId,
        array: ExternalArrayType,
    ) -> LoweringResult<()> {
        self.process_typed_element_address(node)?;
        let value = truncating_use_for(node, array.machine_type().representation)?;
        self.process_input(node, VALUE, value)?;
        self.process_remaining_inputs(node, VALUE + 1)?;
        self.set_output_rep(node, Rep::None)
    }

    fn process_typed_element_address(&mut self, node: NodeId) -> LoweringResult<()> {
        let word = UseInfo::word(self.config.pointer_representation);
        self.process_input(node, BUFFER, UseInfo::any_tagged())?;
        self.process_input(node, BASE, UseInfo::any_tagged())?;
        self.process_input(node, EXTERNAL, word)?;
        self.process_input(node, INDEX, word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smi_narrowing() {
        assert_eq!(
            store_representation(MachineType::any_tagged(), Type::SIGNED31),
            MachineType::tagged_signed()
        );
        assert_eq!(
            store_representation(MachineType::any_tagged(), Type::NUMBER),
            MachineType::any_tagged()
        );
        assert_eq!(
            store_representation(MachineType::float64(), Type::SIGNED31),
            MachineType::float64()
        );
    }

    #[test]
    fn test_untagged_base_needs_no_barrier() {
        let kind = write_barrier_kind_for(
            BaseTaggedness::UntaggedBase,
            Rep::Tagged,
            Some(8),
            Type::ANY,
            Rep::Tagged,
            Type::ANY,
            None,
        );
        assert_eq!(kind, WriteBarrierKind::NoWriteBarrier);
    }

    #[test]
    fn test_number_constants() {
        let store = |value: f64| {
            write_barrier_kind_for(
                BaseTaggedness::TaggedBase,
                Rep::Tagged,
                Some(8),
                Type::ANY,
                Rep::Tagged,
                Type::NUMBER,
                Some(value),
            )
        };
        assert_eq!(store(42.0), WriteBarrierKind::NoWriteBarrier);
        assert_eq!(store(0.5), WriteBarrierKind::PointerWriteBarrier);
    }
}
