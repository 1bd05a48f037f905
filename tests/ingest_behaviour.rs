//! Behavioural tests for the ingestion entry points.

use rstest::{fixture, rstest};
use serde_json::json;
use shpingest::{
    ComponentRole, Error, Geometry, Ingestor, Position, RawFile, RawFileSet, Ring, ingest,
    layer_name,
};

#[allow(dead_code)]
mod support;

use support::{DbfBuilder, ShpBuilder};

fn square(x0: f64, y0: f64, size: f64) -> Vec<(f64, f64)> {
    vec![
        (x0, y0),
        (x0, y0 + size),
        (x0 + size, y0 + size),
        (x0 + size, y0),
        (x0, y0),
    ]
}

fn ring(points: &[(f64, f64)]) -> Ring {
    points.iter().copied().map(Position::from).collect()
}

/// Three square parcels with an owner and an area each.
#[fixture]
fn parcels() -> (ShpBuilder, Vec<u8>) {
    let shp = (0..3).fold(ShpBuilder::new(5), |shp, i| {
        shp.polygon(&[&square(f64::from(i) * 10.0, 0.0, 5.0)])
    });
    let dbf = DbfBuilder::new()
        .field("OWNER", b'C', 16)
        .field("AREA", b'N', 10)
        .field("SURVEYED", b'D', 8)
        .row(&["Ada", "25", "20190412"])
        .row(&["Grace", "25.5", ""])
        .row(&["Linus", "", "20231101"])
        .build();
    (shp, dbf)
}

fn loose(files: &[(&str, Vec<u8>)]) -> RawFileSet {
    files
        .iter()
        .map(|(name, bytes)| RawFile::from_bytes(*name, bytes.clone()))
        .collect()
}

#[rstest]
#[tokio::test]
async fn zipped_parcels_become_polygon_features_in_row_order(parcels: (ShpBuilder, Vec<u8>)) {
    let (shp, dbf) = parcels;
    let zip = support::zip_archive(&[
        ("parcels/", b"".as_slice()),
        ("parcels/parcels.shp", &shp.shp()),
        ("parcels/parcels.shx", &shp.shx()),
        ("parcels/parcels.dbf", &dbf),
    ]);

    let collection = ingest(RawFile::from_bytes("parcels.zip", zip), None, None, None)
        .await
        .expect("archive ingests");

    assert_eq!(collection.len(), 3);
    for (i, feature) in collection.features.iter().enumerate() {
        assert_eq!(
            feature.geometry,
            Some(Geometry::Polygon(vec![ring(&square(i as f64 * 10.0, 0.0, 5.0))]))
        );
    }
    let properties: Vec<_> = collection
        .features
        .iter()
        .map(|f| serde_json::Value::Object(f.properties.clone()))
        .collect();
    assert_eq!(
        properties,
        [
            json!({"OWNER": "Ada", "AREA": 25, "SURVEYED": "2019-04-12"}),
            json!({"OWNER": "Grace", "AREA": 25.5, "SURVEYED": null}),
            json!({"OWNER": "Linus", "AREA": null, "SURVEYED": "2023-11-01"}),
        ]
    );
}

#[rstest]
#[tokio::test]
async fn member_extension_case_is_ignored(parcels: (ShpBuilder, Vec<u8>)) {
    let (shp, dbf) = parcels;
    let zip = support::zip_archive(&[("PARCELS.SHP", shp.shp().as_slice()), ("Parcels.DBF", &dbf)]);

    let collection = Ingestor::default()
        .ingest_files(&loose(&[("upload.ZIP", zip)]))
        .await
        .expect("mixed-case members resolve");
    assert_eq!(collection.len(), 3);
}

#[rstest]
#[case::only_projection(&["a.prj"], &[ComponentRole::Geometry, ComponentRole::Index, ComponentRole::Attributes])]
#[case::no_index(&["a.shp", "a.dbf"], &[ComponentRole::Index])]
#[case::no_geometry(&["a.shx", "a.dbf", "a.prj"], &[ComponentRole::Geometry])]
#[case::only_geometry(&["a.shp"], &[ComponentRole::Index, ComponentRole::Attributes])]
#[tokio::test]
async fn incomplete_loose_upload_names_every_missing_role(
    #[case] names: &[&str],
    #[case] missing: &[ComponentRole],
) {
    let files: RawFileSet = names
        .iter()
        .map(|name| RawFile::from_bytes(*name, Vec::new()))
        .collect();

    let err = Ingestor::default().ingest_files(&files).await.unwrap_err();
    match err {
        Error::MissingRequiredComponent { roles } => assert_eq!(roles, missing),
        other => panic!("expected a missing component error, got {other}"),
    }
}

#[tokio::test]
async fn archive_without_attributes_is_missing_a_component() {
    let shp = ShpBuilder::new(1).point(0.0, 0.0);
    let zip = support::zip_archive(&[("a.shp", shp.shp().as_slice()), ("a.shx", &shp.shx())]);

    let err = ingest(RawFile::from_bytes("a.zip", zip), None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MissingRequiredComponent { ref roles } if roles == &[ComponentRole::Attributes]
    ));
    assert!(err.to_string().contains("attributes (.dbf)"), "{err}");
}

#[rstest]
#[tokio::test]
async fn damaged_index_member_does_not_block_the_archive(parcels: (ShpBuilder, Vec<u8>)) {
    let (shp, dbf) = parcels;
    let index = shp.shx();
    let mut zip = support::zip_archive_stored(&[
        ("parcels.shp", shp.shp().as_slice()),
        ("parcels.shx", &index),
        ("parcels.dbf", &dbf),
    ]);
    let at = zip
        .windows(index.len())
        .position(|w| w == index.as_slice())
        .expect("stored index appears verbatim");
    zip[at + index.len() - 1] ^= 0xFF;

    let collection = ingest(RawFile::from_bytes("parcels.zip", zip), None, None, None)
        .await
        .expect("index is optional inside an archive");
    assert_eq!(collection.len(), 3);
}

#[tokio::test]
async fn coordinates_survive_bit_for_bit() {
    let triangle = [(0.1, 0.2), (0.3, 10.7), (7.9, 0.2), (0.1, 0.2)];
    let points = ShpBuilder::new(1).point(-98.58, 39.83);
    let polygons = ShpBuilder::new(5).polygon(&[&triangle]);
    let dbf = DbfBuilder::new().field("ID", b'N', 2).row(&["1"]).build();

    let point = ingest(
        RawFile::from_bytes("p.shp", points.shp()),
        Some(RawFile::from_bytes("p.shx", points.shx())),
        Some(RawFile::from_bytes("p.dbf", dbf.clone())),
        None,
    )
    .await
    .unwrap();
    let Some(Geometry::Point(p)) = point.features[0].geometry else {
        panic!("expected a point");
    };
    assert_eq!((p.x.to_bits(), p.y.to_bits()), ((-98.58f64).to_bits(), 39.83f64.to_bits()));

    let polygon = ingest(
        RawFile::from_bytes("t.shp", polygons.shp()),
        Some(RawFile::from_bytes("t.shx", polygons.shx())),
        Some(RawFile::from_bytes("t.dbf", dbf)),
        None,
    )
    .await
    .unwrap();
    let Some(Geometry::Polygon(rings)) = &polygon.features[0].geometry else {
        panic!("expected a polygon");
    };
    let decoded: Vec<_> = rings[0].iter().map(|p| (p.x.to_bits(), p.y.to_bits())).collect();
    let expected: Vec<_> = triangle.iter().map(|(x, y)| (x.to_bits(), y.to_bits())).collect();
    assert_eq!(decoded, expected);
}

#[tokio::test]
async fn extra_geometry_record_is_a_count_mismatch() {
    let shp = (0..5).fold(ShpBuilder::new(1), |shp, i| shp.point(f64::from(i), 0.0));
    let dbf = (0..4)
        .fold(DbfBuilder::new().field("ID", b'N', 2), |dbf, i| {
            dbf.row(&[i.to_string().as_str()])
        })
        .build();

    let err = Ingestor::default()
        .ingest_files(&loose(&[("a.shp", shp.shp()), ("a.shx", shp.shx()), ("a.dbf", dbf)]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::RecordCountMismatch {
            geometry: 5,
            attributes: 4
        }
    ));
    assert_eq!(err.stage(), "count mismatch");
}

#[tokio::test]
async fn truncated_geometry_fails_the_whole_upload() {
    let shp = ShpBuilder::new(1).point(1.0, 1.0).point(2.0, 2.0);
    let mut bytes = shp.shp();
    bytes.truncate(bytes.len() - 6);
    let dbf = DbfBuilder::new().field("ID", b'N', 2).row(&["1"]).row(&["2"]).build();

    let err = Ingestor::default()
        .ingest_files(&loose(&[("a.shp", bytes), ("a.shx", shp.shx()), ("a.dbf", dbf)]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TruncatedGeometryRecord { record: 1, .. }), "{err}");
    assert_eq!(err.stage(), "binary decode");
}

#[tokio::test]
async fn null_shape_keeps_its_attribute_row() {
    let shp = ShpBuilder::new(1).point(1.0, 1.0).null();
    let dbf = DbfBuilder::new()
        .field("NAME", b'C', 8)
        .row(&["kept"])
        .row(&["empty"])
        .build();

    let collection = Ingestor::default()
        .ingest_files(&loose(&[("a.shp", shp.shp()), ("a.shx", shp.shx()), ("a.dbf", dbf)]))
        .await
        .unwrap();

    assert_eq!(collection.len(), 2);
    assert_eq!(collection.features[1].geometry, None);
    assert_eq!(collection.features[1].properties["NAME"], "empty");

    let document = serde_json::to_value(&collection).unwrap();
    assert_eq!(
        document["features"][1],
        json!({"type": "Feature", "geometry": null, "properties": {"NAME": "empty"}})
    );
}

#[tokio::test]
async fn damaged_archive_is_reported_as_corrupt() {
    let err = ingest(
        RawFile::from_bytes("a.zip", b"PK\x03\x04 but nothing else".to_vec()),
        None,
        None,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::ArchiveCorrupt { .. }));
    assert_eq!(err.stage(), "archive open");
}

#[tokio::test]
async fn loose_files_are_read_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let shp = ShpBuilder::new(1).point(3.0, 4.0);
    let dbf = DbfBuilder::new().field("NAME", b'C', 8).row(&["here"]).build();
    for (name, bytes) in [("site.shp", shp.shp()), ("site.shx", shp.shx()), ("site.dbf", dbf)] {
        std::fs::write(dir.path().join(name), bytes).unwrap();
    }

    let files: RawFileSet = ["site.shp", "site.shx", "site.dbf"]
        .into_iter()
        .map(|name| RawFile::open(&dir.path().join(name)))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(files.layer_name(), Some("site"));

    let collection = Ingestor::default().ingest_files(&files).await.unwrap();
    assert_eq!(
        collection.features[0].geometry,
        Some(Geometry::Point(Position::new(3.0, 4.0)))
    );
}

#[test]
fn missing_file_on_disk_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = RawFile::open(&dir.path().join("absent.shp")).unwrap_err();
    assert!(matches!(err, Error::Read { .. }));
    assert_eq!(err.stage(), "file read");
}

#[tokio::test]
async fn polygon_with_hole_and_second_shell() {
    let mut hole = square(1.0, 1.0, 2.0);
    hole.reverse();
    let shp = ShpBuilder::new(5).polygon(&[&square(0.0, 0.0, 4.0), &square(10.0, 0.0, 1.0), &hole]);
    let dbf = DbfBuilder::new().field("ID", b'N', 2).row(&["1"]).build();

    let collection = Ingestor::default()
        .ingest_files(&loose(&[("a.shp", shp.shp()), ("a.shx", shp.shx()), ("a.dbf", dbf)]))
        .await
        .unwrap();
    assert_eq!(
        collection.features[0].geometry,
        Some(Geometry::MultiPolygon(vec![
            vec![ring(&square(0.0, 0.0, 4.0)), ring(&hole)],
            vec![ring(&square(10.0, 0.0, 1.0))],
        ]))
    );
}

#[rstest]
#[case("parcels.zip", "parcels")]
#[case("Roads.SHP", "Roads")]
#[case("county.lines.dbf", "county.lines")]
#[case("readme", "readme")]
fn layer_names_drop_the_extension(#[case] file: &str, #[case] expected: &str) {
    assert_eq!(layer_name(file), expected);
}
