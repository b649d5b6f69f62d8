#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::sync::Arc;
    use arrow::array::{ArrayRef, Int64Array, RecordBatch, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use crate::fetching::arrow_fetcher::{bbox_leaf_indices, matching_row_groups, ArrowFetcher};
    use crate::fetching::ColumnFetcher;
    use crate::predicate::bbox_predicate::{BboxPredicate, BoundingBox};
    use crate::unit_tests::fixtures::*;
    use crate::utils::file_interaction_local_and_cloud::StoreAccess;
    use crate::DatasetSource;

    fn boston() -> BboxPredicate {
        BboxPredicate::intersecting(&BoundingBox::from(BOSTON))
    }

    fn fetcher() -> ArrowFetcher {
        ArrowFetcher::new(StoreAccess::anonymous(None))
    }

    #[tokio::test]
    async fn test_fetch_ids_from_file() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let dir = FixtureDir::new("arrow-file");
        let path = dir.path("buildings.parquet");
        write_parquet(&path, &building_batch(&boston_buildings()), None)?;

        let ids = fetcher().fetch_column(&DatasetSource::Path(path), "id", &boston()).await?;
        assert_eq!(ids, vec![Some("inside-common".to_string())]);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_ids_from_directory() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let dir = FixtureDir::new("arrow-dir");
        let config = write_boston_dataset(&dir)?;

        let ids = fetcher().fetch_column(&config.direct_source(), "id", &boston()).await?;
        assert_eq!(ids, vec![Some("inside-common".to_string())]);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_filenames_from_index() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let dir = FixtureDir::new("arrow-index");
        let config = write_boston_dataset(&dir)?;

        let fetcher = ArrowFetcher::new(StoreAccess::credentialed(None));
        let filenames = fetcher.fetch_column(&config.index_source(), "filename", &boston()).await?;
        assert_eq!(filenames, vec![Some(dir.path("dataset/part-0.parquet"))]);
        Ok(())
    }

    #[tokio::test]
    async fn test_matches_across_batches_and_row_groups_keep_order() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let dir = FixtureDir::new("arrow-order");
        let path = dir.path("many.parquet");

        // 20_000 rows in row groups of 3_000; every third row intersects
        let rows: Vec<(String, BoundingBox)> = (0..20_000)
            .map(|i| {
                let bbox = if i % 3 == 0 {
                    BoundingBox::new(-71.066, 42.355, -71.064, 42.357)
                } else {
                    BoundingBox::new(-71.050, 42.330, -71.045, 42.335)
                };
                (format!("b{:05}", i), bbox)
            })
            .collect();
        let borrowed: Vec<(&str, BoundingBox)> = rows.iter().map(|(id, b)| (id.as_str(), *b)).collect();
        write_parquet(&path, &building_batch(&borrowed), Some(3_000))?;

        let ids = fetcher().fetch_column(&DatasetSource::Path(path), "id", &boston()).await?;
        let expected: Vec<Option<String>> = (0..20_000)
            .filter(|i| i % 3 == 0)
            .map(|i| Some(format!("b{:05}", i)))
            .collect();
        assert_eq!(ids, expected);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_files_are_read_twice() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let dir = FixtureDir::new("arrow-duplicates");
        let path = dir.path("buildings.parquet");
        write_parquet(&path, &building_batch(&boston_buildings()), None)?;

        let source = DatasetSource::Paths(vec![path.clone(), path]);
        let ids = fetcher().fetch_column(&source, "id", &boston()).await?;
        assert_eq!(ids.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_non_string_column_rendered_as_text() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let dir = FixtureDir::new("arrow-int-column");
        let path = dir.path("numbered.parquet");

        let buildings = building_batch(&boston_buildings());
        let schema = Arc::new(Schema::new(vec![
            Field::new("osm_id", DataType::Int64, true),
            buildings.schema().field(1).clone(),
        ]));
        let batch = RecordBatch::try_new(schema, vec![
            Arc::new(Int64Array::from(vec![Some(101), None, Some(303)])) as ArrayRef,
            Arc::clone(buildings.column(1)),
        ])?;
        write_parquet(&path, &batch, None)?;

        let ids = fetcher().fetch_column(&DatasetSource::Path(path), "osm_id", &boston()).await?;
        assert_eq!(ids, vec![Some("101".to_string())]);
        Ok(())
    }

    #[tokio::test]
    async fn test_null_ids_are_counted() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let dir = FixtureDir::new("arrow-null-ids");
        let path = dir.path("nulls.parquet");

        let buildings = building_batch(&[
            ("a", BoundingBox::new(-71.066, 42.355, -71.064, 42.357)),
            ("b", BoundingBox::new(-71.065, 42.356, -71.063, 42.358)),
        ]);
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, true),
            buildings.schema().field(1).clone(),
        ]));
        let batch = RecordBatch::try_new(schema, vec![
            Arc::new(StringArray::from(vec![None, Some("b")])) as ArrayRef,
            Arc::clone(buildings.column(1)),
        ])?;
        write_parquet(&path, &batch, None)?;

        let ids = fetcher().fetch_column(&DatasetSource::Path(path), "id", &boston()).await?;
        assert_eq!(ids, vec![None, Some("b".to_string())]);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_column_is_an_error() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let dir = FixtureDir::new("arrow-unknown-column");
        let path = dir.path("buildings.parquet");
        write_parquet(&path, &building_batch(&boston_buildings()), None)?;

        let err = fetcher()
            .fetch_column(&DatasetSource::Path(path), "height", &boston())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("height"), "{}", err);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_bbox_is_an_error() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let dir = FixtureDir::new("arrow-no-bbox");
        let path = dir.path("plain.parquet");
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Utf8, false)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(vec!["a"])) as ArrayRef])?;
        write_parquet(&path, &batch, None)?;

        let err = fetcher()
            .fetch_column(&DatasetSource::Path(path), "id", &boston())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bbox.xmin"), "{}", err);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = FixtureDir::new("arrow-missing");
        let source = DatasetSource::Paths(vec![dir.path("nope.parquet")]);
        assert!(fetcher().fetch_column(&source, "id", &boston()).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_file_list_yields_nothing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ids = fetcher().fetch_column(&DatasetSource::Paths(Vec::new()), "id", &boston()).await?;
        assert!(ids.is_empty());
        Ok(())
    }

    #[test]
    fn test_row_groups_pruned_by_statistics() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let dir = FixtureDir::new("arrow-pruning");
        let path = dir.path("buildings.parquet");
        // One building per row group; only the first intersects
        write_parquet(&path, &building_batch(&boston_buildings()), Some(1))?;

        let reader = SerializedFileReader::new(File::open(&path)?)?;
        let metadata = reader.metadata();
        assert_eq!(metadata.num_row_groups(), 3);

        let predicate = boston();
        let leaves = bbox_leaf_indices(metadata.file_metadata().schema_descr(), &predicate)?;
        assert_eq!(leaves.len(), 4);
        assert_eq!(matching_row_groups(metadata, &leaves, &predicate), vec![0]);

        let everything = BboxPredicate::intersecting(&BoundingBox::new(-180.0, -90.0, 180.0, 90.0));
        assert_eq!(matching_row_groups(metadata, &leaves, &everything), vec![0, 1, 2]);
        Ok(())
    }
}
