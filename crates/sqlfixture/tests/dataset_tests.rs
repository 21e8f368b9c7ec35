//! Dataset, format and comparison tests through the public API.

mod common;

use common::init_tracing;
use sqlfixture::core::column::Column;
use sqlfixture::dataset::{CompositeDataSet, DataSetBuilder, SortedTable, TableProducer};
use sqlfixture::dataset::{DataSetProducer, FilteredDataSet, IncludeTableFilter};
use sqlfixture::format::{dataset_to_string, YamlDataSet};
use sqlfixture::{
    ColumnType, Comparer, DataSet, DefaultDataSet, DefaultTable, DiscrepancyKind, Table,
    TableMetaData, Value,
};

fn make_test_people() -> DefaultDataSet {
    let metadata = TableMetaData::new(
        "PEOPLE",
        vec![
            Column::new("ID", ColumnType::Integer),
            Column::new("NAME", ColumnType::Varchar),
            Column::new("SCORE", ColumnType::Decimal),
        ],
    )
    .unwrap()
    .with_primary_keys(&["ID"])
    .unwrap();
    let rows = vec![
        vec![Value::Int(1), Value::from("ann"), Value::from("1.50")],
        vec![Value::Int(2), Value::from("bob"), Value::Null],
        vec![Value::Int(3), Value::from("cy"), Value::from("7")],
    ];
    DefaultDataSet::from_tables(vec![DefaultTable::with_rows(metadata, rows).unwrap()]).unwrap()
}

#[test]
fn test_composite_of_yaml_datasets_keeps_order() {
    let first = YamlDataSet::parse("B: []\nC:\n  - id: 1\n")
        .unwrap()
        .into_dataset()
        .unwrap();
    let second = YamlDataSet::parse(
        "D:\n  - id: 1\n    name: D1\n  - id: 2\n    name: D2\n",
    )
    .unwrap()
    .into_dataset()
    .unwrap();

    let composite = CompositeDataSet::new(&[&first as &dyn DataSet, &second]);
    assert_eq!(composite.table_names(), vec!["B", "C", "D"]);

    let d = composite.table("D").unwrap();
    assert_eq!(d.row_count(), 2);
    assert_eq!(d.metadata().column_names(), vec!["id", "name"]);

    let visited: Vec<&str> = composite.iter().map(|t| t.metadata().name()).collect();
    assert_eq!(visited, vec!["B", "C", "D"]);
}

#[test]
fn test_yaml_round_trip_compares_equal() {
    init_tracing();
    let original = YamlDataSet::parse(
        "ORDERS:\n  - id: 1\n    note: first\n    shipped: null\n  - id: 2\n    note: second\nEMPTY: []\n",
    )
    .unwrap()
    .into_dataset()
    .unwrap();

    let text = dataset_to_string(&original).unwrap();
    let reread = YamlDataSet::parse(&text).unwrap().into_dataset().unwrap();

    let diff = Comparer::new().compare(&original, &reread).unwrap();
    assert!(diff.is_empty(), "{}", diff.summary());
    let orders = reread.table("ORDERS").unwrap();
    assert_eq!(orders.value(0, "shipped").unwrap(), &Value::Null);
    assert_eq!(orders.value(1, "shipped").unwrap(), &Value::Unset);
}

#[test]
fn test_producer_round_trip_through_builder() {
    let original = make_test_people();
    let mut producer = TableProducer::new(&original);
    let copy = DataSetBuilder::build_from(&mut producer).unwrap();
    assert!(Comparer::new().compare(&original, &copy).unwrap().is_empty());

    let empty = DefaultDataSet::new();
    let mut producer = TableProducer::new(&empty);
    let copy = DataSetBuilder::build_from(&mut producer).unwrap();
    assert!(copy.is_empty());
}

#[test]
fn test_compare_is_reflexive() {
    let people = make_test_people();
    let diff = Comparer::new().strict(true).compare(&people, &people).unwrap();
    assert!(diff.is_empty());
}

#[test]
fn test_one_missing_row_is_one_row_count_mismatch() {
    let expected = make_test_people();
    let table = expected.table("PEOPLE").unwrap();
    let rows = (0..2).map(|r| table.row_values(r).unwrap()).collect();
    let actual = DefaultDataSet::from_tables(vec![DefaultTable::with_rows(
        table.metadata().clone(),
        rows,
    )
    .unwrap()])
    .unwrap();

    let diff = Comparer::new().compare(&expected, &actual).unwrap();
    assert_eq!(diff.len(), 1);
    assert_eq!(diff.count(DiscrepancyKind::RowCountMismatch), 1);
    assert_eq!(diff.count(DiscrepancyKind::ValueMismatch), 0);
    assert!(diff.into_result().is_err());
}

#[test]
fn test_merged_table_diffs_keep_order() {
    let expected = make_test_people();
    let people = expected.table("PEOPLE").unwrap();
    let first = YamlDataSet::parse("PEOPLE:\n  - ID: 1\n    NAME: ann\n    SCORE: 1.50\n")
        .unwrap()
        .into_dataset()
        .unwrap();
    let second = YamlDataSet::parse("PEOPLE:\n  - ID: 1\n    NAME: zed\n    SCORE: 1.5\n  - ID: 2\n    NAME: bob\n    SCORE: null\n  - ID: 3\n    NAME: cy\n    SCORE: 7\n")
        .unwrap()
        .into_dataset()
        .unwrap();

    let comparer = Comparer::new();
    let mut diff = comparer
        .compare_tables(people, first.table("PEOPLE").unwrap())
        .unwrap();
    assert_eq!(diff.len(), 1);
    diff.merge(
        comparer
            .compare_tables(people, second.table("PEOPLE").unwrap())
            .unwrap(),
    );

    assert_eq!(diff.len(), 2);
    let kinds: Vec<DiscrepancyKind> = diff.discrepancies().iter().map(|d| d.kind()).collect();
    assert_eq!(
        kinds,
        vec![DiscrepancyKind::RowCountMismatch, DiscrepancyKind::ValueMismatch]
    );
    assert_eq!(diff.for_table("people").count(), 2);
}

#[test]
fn test_sorted_view_orders_by_primary_key() {
    let metadata = TableMetaData::new(
        "T",
        vec![
            Column::new("ID", ColumnType::Integer),
            Column::new("NAME", ColumnType::Varchar),
        ],
    )
    .unwrap()
    .with_primary_keys(&["ID"])
    .unwrap();
    let table = DefaultTable::with_rows(
        metadata,
        vec![
            vec![Value::Int(10), Value::from("b")],
            vec![Value::Int(9), Value::from("a")],
        ],
    )
    .unwrap();

    let sorted = SortedTable::new(&table).unwrap();
    assert_eq!(sorted.value(0, "ID").unwrap(), &Value::Int(9));
    assert_eq!(sorted.value(1, "NAME").unwrap(), &Value::from("b"));
}

#[test]
fn test_filtered_dataset_view() {
    let dataset = YamlDataSet::parse("A_ONE: []\nB_TWO: []\nA_THREE: []\n")
        .unwrap()
        .into_dataset()
        .unwrap();
    let filter = IncludeTableFilter::new(&["a_*"], false).unwrap();
    let view = FilteredDataSet::new(&dataset, &filter);
    assert_eq!(view.table_names(), vec!["A_ONE", "A_THREE"]);

    let mut producer = TableProducer::new(&view);
    let copy = DataSetBuilder::build_from(&mut producer).unwrap();
    assert_eq!(copy.len(), 2);
}

#[test]
fn test_producer_trait_object() {
    let people = make_test_people();
    let mut producer = TableProducer::new(&people);
    let producer: &mut dyn DataSetProducer = &mut producer;
    let copy = DataSetBuilder::build_from(producer).unwrap();
    assert_eq!(copy.table("people").unwrap().row_count(), 3);
}
