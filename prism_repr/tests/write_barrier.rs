//! Write barrier selection for tagged stores.

use pretty_assertions::assert_eq;
use prism_repr::ir::{
    BaseTaggedness, HeapConstant, HeapObjectClass, Type, WriteBarrierKind, MAP_OFFSET,
};
use prism_repr::lower::rules::write_barrier_kind_for;
use prism_repr::MachineRepresentation as Rep;

const FIELD: Option<u32> = Some(8);

fn tagged_store(field_type: Type, value_rep: Rep, value_type: Type) -> WriteBarrierKind {
    write_barrier_kind_for(
        BaseTaggedness::TaggedBase,
        Rep::Tagged,
        FIELD,
        field_type,
        value_rep,
        value_type,
        None,
    )
}

#[test]
fn test_barrier_ranking() {
    assert!(WriteBarrierKind::NoWriteBarrier < WriteBarrierKind::PointerWriteBarrier);
    assert!(WriteBarrierKind::PointerWriteBarrier < WriteBarrierKind::MapWriteBarrier);
    assert!(WriteBarrierKind::MapWriteBarrier < WriteBarrierKind::FullWriteBarrier);
}

#[test]
fn test_heap_values_always_get_a_barrier() {
    let value_types = [
        Type::ANY,
        Type::STRING,
        Type::SYMBOL,
        Type::RECEIVER,
        Type::BIGINT,
        Type::NUMBER,
        Type::PLAIN_NUMBER,
        Type::INTERNAL,
        Type::heap_constant(HeapConstant::object(HeapConstant::FIRST_USER_ID, HeapObjectClass::Receiver)),
        Type::heap_constant(HeapConstant::NUMBER_STRING_CACHE),
    ];
    let field_types = [Type::ANY, Type::RECEIVER, Type::NUMBER];
    let reps = [Rep::Tagged, Rep::TaggedPointer];

    for &field_type in &field_types {
        for &value_type in &value_types {
            for &value_rep in &reps {
                let kind = tagged_store(field_type, value_rep, value_type);
                assert_ne!(
                    kind,
                    WriteBarrierKind::NoWriteBarrier,
                    "{value_rep:?} {value_type} into {field_type}"
                );
            }
        }
    }
}

#[test]
fn test_barrier_elision() {
    // Smis are not pointers.
    assert_eq!(
        tagged_store(Type::ANY, Rep::TaggedSigned, Type::SIGNED_SMALL),
        WriteBarrierKind::NoWriteBarrier
    );
    // Oddballs are immortal.
    assert_eq!(
        tagged_store(Type::ANY, Rep::Tagged, Type::BOOLEAN_OR_NULL_OR_UNDEFINED),
        WriteBarrierKind::NoWriteBarrier
    );
    assert_eq!(
        tagged_store(Type::ANY, Rep::TaggedPointer, Type::heap_constant(HeapConstant::EMPTY_STRING)),
        WriteBarrierKind::NoWriteBarrier
    );
    // Untagged bases and untagged fields are not scanned.
    assert_eq!(
        write_barrier_kind_for(
            BaseTaggedness::UntaggedBase,
            Rep::Tagged,
            FIELD,
            Type::ANY,
            Rep::Tagged,
            Type::ANY,
            None,
        ),
        WriteBarrierKind::NoWriteBarrier
    );
    assert_eq!(
        write_barrier_kind_for(
            BaseTaggedness::TaggedBase,
            Rep::Float64,
            FIELD,
            Type::NUMBER,
            Rep::Float64,
            Type::NUMBER,
            None,
        ),
        WriteBarrierKind::NoWriteBarrier
    );
}

#[test]
fn test_barrier_strength() {
    assert_eq!(
        tagged_store(Type::ANY, Rep::TaggedPointer, Type::STRING),
        WriteBarrierKind::PointerWriteBarrier
    );
    assert_eq!(
        tagged_store(Type::ANY, Rep::Tagged, Type::ANY),
        WriteBarrierKind::FullWriteBarrier
    );
    // The map word always takes the map barrier.
    assert_eq!(
        write_barrier_kind_for(
            BaseTaggedness::TaggedBase,
            Rep::TaggedPointer,
            Some(MAP_OFFSET),
            Type::INTERNAL,
            Rep::TaggedPointer,
            Type::INTERNAL,
            None,
        ),
        WriteBarrierKind::MapWriteBarrier
    );
}

#[test]
fn test_number_constant_barriers() {
    let store = |value: f64| {
        write_barrier_kind_for(
            BaseTaggedness::TaggedBase,
            Rep::Tagged,
            None,
            Type::ANY,
            Rep::Tagged,
            Type::constant(value),
            Some(value),
        )
    };
    assert_eq!(store(42.0), WriteBarrierKind::NoWriteBarrier);
    // A heap number is a fresh pointer.
    assert_eq!(store(0.5), WriteBarrierKind::PointerWriteBarrier);
    assert_eq!(store(-0.0), WriteBarrierKind::PointerWriteBarrier);
}
