//! End-to-end pipelines across the whole verb vocabulary, exercised the
//! way a caller would: through the facade re-exports.

use tidyframe::prelude::*;
use tidyframe::{reduce, window};

fn characters() -> DataFrame {
    DataFrame::from_columns(vec![
        (
            "name".to_owned(),
            ["Luke", "C-3PO", "R2-D2", "Leia", "Chewbacca", "Han"]
                .iter()
                .map(|s| Scalar::Utf8((*s).to_owned()))
                .collect(),
        ),
        (
            "species".to_owned(),
            ["Human", "Droid", "Droid", "Human", "Wookiee", "Human"]
                .iter()
                .map(|s| Scalar::Utf8((*s).to_owned()))
                .collect(),
        ),
        (
            "height".to_owned(),
            vec![
                Scalar::Int64(172),
                Scalar::Int64(167),
                Scalar::Int64(96),
                Scalar::Int64(150),
                Scalar::Int64(228),
                Scalar::null(),
            ],
        ),
    ])
    .expect("fixture builds")
}

#[test]
fn filter_group_summarise_arrange_pipeline() {
    let df = characters();
    let measured = tidyframe::remove_missing(&df, &["height"]).expect("drop unmeasured");
    let grouped = measured.group_by(&["species"]).expect("group");
    let stats = summarise(
        &grouped,
        vec![
            ("tallest".to_owned(), reduce::max("height")),
            ("n".to_owned(), reduce::nrows()),
        ],
    )
    .expect("summarise");
    let ranked = arrange(&stats, &[("tallest", SortDirection::Desc)]).expect("arrange");

    assert_eq!(
        ranked.values("species").expect("species"),
        vec![
            Scalar::Utf8("Wookiee".to_owned()),
            Scalar::Utf8("Human".to_owned()),
            Scalar::Utf8("Droid".to_owned()),
        ]
    );
    assert_eq!(
        ranked.values("n").expect("n"),
        vec![Scalar::Int64(1), Scalar::Int64(2), Scalar::Int64(2)]
    );
}

#[test]
fn mutate_window_functions_via_over_groups() {
    let df = characters()
        .group_by(&["species"])
        .expect("group");
    let ranked = window::over_groups(&df, "height", "height_rank", |values| {
        Ok(window::dense_rank(values, SortDirection::Asc))
    })
    .expect("over_groups");

    // Within Droids: R2-D2 (96) ranks 1, C-3PO (167) ranks 2.
    let names = ranked.values("name").expect("name");
    let ranks = ranked.values("height_rank").expect("height_rank");
    let r2 = names
        .iter()
        .position(|n| *n == Scalar::Utf8("R2-D2".to_owned()))
        .expect("R2-D2 present");
    assert_eq!(ranks[r2], Scalar::Int64(1));
}

#[test]
fn join_then_count_round_trip() {
    let homes = DataFrame::from_columns(vec![
        (
            "species".to_owned(),
            vec![
                Scalar::Utf8("Human".to_owned()),
                Scalar::Utf8("Droid".to_owned()),
            ],
        ),
        (
            "homeworld".to_owned(),
            vec![
                Scalar::Utf8("various".to_owned()),
                Scalar::Utf8("factory".to_owned()),
            ],
        ),
    ])
    .expect("fixture builds");

    let joined = inner_join(
        &characters(),
        &homes,
        &JoinKeys::same(&["species"]),
        &JoinOptions::default(),
    )
    .expect("join");
    assert_eq!(joined.nrows(), 5);

    let tally = count(&joined, &["homeworld"]).expect("count");
    assert_eq!(
        tally.values("n").expect("n"),
        vec![Scalar::Int64(3), Scalar::Int64(2)]
    );
}

#[test]
fn facade_transpose_auto_detects_its_own_label_column() {
    let df = DataFrame::from_columns(vec![
        ("a".to_owned(), vec![Scalar::Int64(1), Scalar::Int64(2)]),
        (
            "b".to_owned(),
            vec![Scalar::Utf8("x".to_owned()), Scalar::Utf8("y".to_owned())],
        ),
    ])
    .expect("fixture builds");

    let once = transpose(&df).expect("first transpose");
    let twice = transpose(&once).expect("second transpose");
    assert!(twice.semantic_eq(&df));
}

#[test]
fn reshape_round_trip_through_the_facade() {
    let long = DataFrame::from_columns(vec![
        (
            "id".to_owned(),
            vec![Scalar::Int64(1), Scalar::Int64(1), Scalar::Int64(2), Scalar::Int64(2)],
        ),
        (
            "key".to_owned(),
            ["x", "y", "x", "y"]
                .iter()
                .map(|s| Scalar::Utf8((*s).to_owned()))
                .collect(),
        ),
        (
            "value".to_owned(),
            vec![
                Scalar::Float64(1.5),
                Scalar::Float64(2.5),
                Scalar::Float64(3.5),
                Scalar::Float64(4.5),
            ],
        ),
    ])
    .expect("fixture builds");

    let wide = pivot_wider(&long, &PivotWider::new("key", "value")).expect("wider");
    let back = pivot_longer(&wide, &["x", "y"], "key", "value").expect("longer");
    assert!(back.semantic_eq(&long));
}

#[test]
fn json_export_expands_nested_cells() {
    let df = characters().group_by(&["species"]).expect("group");
    let nested: tidyframe::Reducer = Box::new(|sub| Ok(Scalar::Nested(sub.to_rows())));
    let packed = summarise(&df, vec![("members".to_owned(), nested)]).expect("summarise");

    let parsed = packed.to_json();
    let rows = parsed.as_array().expect("row array");
    assert_eq!(rows.len(), 3);
    assert!(rows[0]["members"].is_array());
    assert_eq!(rows[0]["members"][0]["name"], "Luke");
}

#[tokio::test]
async fn deferred_pipeline_matches_the_sync_result() {
    let df = characters();
    let sync = mutate_one(
        &tidyframe::remove_missing(&df, &["height"]).expect("sync filter"),
        "height_m",
        Mutation::per_row(|row, _| {
            Scalar::Float64(row.f64("height").unwrap_or_default() / 100.0)
        }),
    )
    .expect("sync mutate");

    let deferred = PendingFrame::resolved(df)
        .then_sync(|df| tidyframe::remove_missing(&df, &["height"]))
        .mutate(
            "height_m",
            |row, _| async move {
                Ok(Scalar::Float64(row.f64("height").unwrap_or_default() / 100.0))
            },
            AsyncOptions::default(),
        )
        .await
        .expect("deferred pipeline");

    assert!(deferred.semantic_eq(&sync));
}
