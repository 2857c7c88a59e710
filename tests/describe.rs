use mssql_describe::testing::{fixtures, MockClient};
use mssql_describe::{
    describe, Cardinality, CommandInput, CommandOptions, ConnectionTarget, Direction, Error,
    OutputShape, ResultType, SourceId, SqlValue, TypeCatalogRegistry, TypeId,
};

fn client() -> MockClient {
    MockClient::new()
        .on("SERVERPROPERTY", fixtures::product_version("15.0.2000.5"))
        .on("FROM sys.types", fixtures::sys_types())
        .on("FROM sys.table_types", fixtures::sys_table_types())
}

fn input(text: &str) -> CommandInput {
    CommandInput::new(
        "Cmd",
        text,
        ConnectionTarget::Url("mssql://localhost/app".into()),
    )
}

fn options(result_type: ResultType) -> CommandOptions {
    CommandOptions {
        result_type,
        ..CommandOptions::default()
    }
}

#[test]
fn it_describes_a_filtered_select() -> anyhow::Result<()> {
    let mut client = client()
        .on(
            "sp_describe_undeclared_parameters",
            fixtures::suggested_parameters(&[(1, "@minAge", TypeId::INT, true, false)]),
        )
        .on(
            "dm_exec_describe_first_result_set",
            fixtures::introspected_columns(&[
                (1, Some("id"), TypeId::INT, false),
                (2, Some("name"), TypeId::NVARCHAR, true),
            ]),
        );

    let registry = TypeCatalogRegistry::new();
    let descriptor = describe(
        &mut client,
        &registry,
        &input("SELECT id, name FROM users WHERE age > @minAge"),
    )?;

    let parameters = descriptor.parameters();
    assert_eq!(parameters.len(), 1);
    assert_eq!(parameters[0].name(), "@minAge");
    assert_eq!(parameters[0].direction(), Direction::Input);
    assert_eq!(parameters[0].type_info().name(), "int");
    assert_eq!(parameters[0].type_info().rust_type(), Some("i32"));

    match descriptor.output().shape() {
        OutputShape::Record(columns) => {
            assert_eq!(columns.len(), 2);

            assert_eq!(columns[0].name(), "id");
            assert_eq!(columns[0].ordinal(), 0);
            assert!(!columns[0].nullable());
            assert_eq!(columns[0].type_info().rust_type(), Some("i32"));

            assert_eq!(columns[1].name(), "name");
            assert_eq!(columns[1].ordinal(), 1);
            assert!(columns[1].nullable()); // emitters wrap this in Option
            assert_eq!(columns[1].type_info().rust_type(), Some("String"));
        }
        other => panic!("unexpected shape: {other:?}"),
    }

    assert_eq!(descriptor.output().cardinality(), Cardinality::Many);

    Ok(())
}

#[test]
fn it_treats_a_statement_without_columns_as_a_row_count() -> anyhow::Result<()> {
    let mut client = client()
        .on(
            "sp_describe_undeclared_parameters",
            fixtures::suggested_parameters(&[
                (1, "@n", TypeId::NVARCHAR, true, false),
                (2, "@id", TypeId::INT, true, false),
            ]),
        )
        .on(
            "dm_exec_describe_first_result_set",
            fixtures::introspected_columns(&[]),
        );

    let registry = TypeCatalogRegistry::new();
    let descriptor = describe(
        &mut client,
        &registry,
        &input("UPDATE users SET name = @n WHERE id = @id"),
    )?;

    assert_eq!(descriptor.parameters().len(), 2);

    // the requested Records shape is moot for a non-query
    assert!(matches!(
        descriptor.output().shape(),
        OutputShape::RowsAffected
    ));
    assert_eq!(descriptor.output().cardinality(), Cardinality::One);

    Ok(())
}

#[test]
fn it_collapses_a_single_column_to_scalar() -> anyhow::Result<()> {
    let mut client = client()
        .on(
            "sp_describe_undeclared_parameters",
            fixtures::suggested_parameters(&[]),
        )
        .on(
            "dm_exec_describe_first_result_set",
            fixtures::introspected_columns(&[(1, Some("total"), TypeId::BIGINT, false)]),
        );

    let registry = TypeCatalogRegistry::new();

    for result_type in [ResultType::Records, ResultType::Tuples] {
        let descriptor = describe(
            &mut client,
            &registry,
            &input("SELECT COUNT_BIG(*) AS total FROM users").with_options(options(result_type)),
        )?;

        match descriptor.output().shape() {
            OutputShape::Scalar(column) => {
                assert_eq!(column.name(), "total");
                assert_eq!(column.type_info().rust_type(), Some("i64"));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    Ok(())
}

#[test]
fn it_maps_parameter_directions() -> anyhow::Result<()> {
    let mut client = client()
        .on(
            "sp_describe_undeclared_parameters",
            fixtures::suggested_parameters(&[
                (1, "@both", TypeId::INT, true, true),
                (2, "@out", TypeId::INT, false, true),
                (3, "@in", TypeId::INT, true, false),
                (4, "@neither", TypeId::INT, false, false),
            ]),
        )
        .on(
            "dm_exec_describe_first_result_set",
            fixtures::introspected_columns(&[]),
        );

    let registry = TypeCatalogRegistry::new();
    let descriptor = describe(&mut client, &registry, &input("EXEC dbo.Mixed ..."))?;

    let directions: Vec<Direction> = descriptor
        .parameters()
        .iter()
        .map(|p| p.direction())
        .collect();

    assert_eq!(
        directions,
        [
            Direction::InputOutput,
            Direction::Output,
            Direction::Input,
            Direction::Input,
        ]
    );

    Ok(())
}

#[test]
fn it_falls_back_to_the_result_set_header() -> anyhow::Result<()> {
    let mut client = client()
        .on(
            "sp_describe_undeclared_parameters",
            fixtures::suggested_parameters(&[]),
        )
        .on(
            "dm_exec_describe_first_result_set",
            fixtures::introspection_error(11509, "The metadata could not be determined."),
        )
        .on(
            "SET FMTONLY ON",
            fixtures::header(&[
                ("id", TypeId::INT, false),
                ("total", TypeId::FLOAT, true),
            ]),
        );

    let registry = TypeCatalogRegistry::new();
    let descriptor = describe(
        &mut client,
        &registry,
        &input("SELECT id, total FROM #session_scratch"),
    )?;

    match descriptor.output().shape() {
        OutputShape::Record(columns) => {
            assert_eq!(columns.len(), 2);
            assert_eq!(columns[1].name(), "total");
            assert_eq!(columns[1].type_info().name(), "float");
        }
        other => panic!("unexpected shape: {other:?}"),
    }

    Ok(())
}

#[test]
fn it_surfaces_the_primary_error_when_both_introspections_fail() {
    let mut client = client()
        .on(
            "sp_describe_undeclared_parameters",
            fixtures::suggested_parameters(&[]),
        )
        .on(
            "dm_exec_describe_first_result_set",
            fixtures::introspection_error(11509, "The metadata could not be determined."),
        )
        .fail_on(
            "SET FMTONLY ON",
            mssql_describe::EngineError::new(208, 16, "Invalid object name '#t'."),
        );

    let registry = TypeCatalogRegistry::new();
    let err = describe(&mut client, &registry, &input("SELECT x FROM #t")).unwrap_err();

    match err {
        Error::SchemaIntrospectionFailed(primary) => {
            // the fallback's 208 is discarded as diagnostic noise
            assert_eq!(primary.number, 11509);
            assert!(primary.message.contains("could not be determined"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn it_rejects_unnamed_columns() {
    let mut client = client()
        .on(
            "sp_describe_undeclared_parameters",
            fixtures::suggested_parameters(&[]),
        )
        .on(
            "dm_exec_describe_first_result_set",
            fixtures::introspected_columns(&[
                (1, Some("id"), TypeId::INT, false),
                (2, None, TypeId::INT, false),
            ]),
        );

    let registry = TypeCatalogRegistry::new();
    let err = describe(&mut client, &registry, &input("SELECT id, 1 + 1 FROM t")).unwrap_err();

    match err {
        Error::EmptyColumnName { ordinal } => assert_eq!(ordinal, 1),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn it_fails_on_an_unmapped_type() {
    let mut client = client()
        .on(
            "sp_describe_undeclared_parameters",
            fixtures::suggested_parameters(&[]),
        )
        .on(
            "dm_exec_describe_first_result_set",
            fixtures::introspected_columns(&[(1, Some("payload"), TypeId::SQL_VARIANT, true)]),
        );

    let registry = TypeCatalogRegistry::new();
    let err = describe(&mut client, &registry, &input("SELECT payload FROM t")).unwrap_err();

    match err {
        Error::UnmappedType {
            type_id,
            udt_name,
            context,
        } => {
            assert_eq!(type_id, 98);
            assert_eq!(udt_name, None);
            assert_eq!(context, "column `payload` at ordinal 0");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn it_skips_column_introspection_for_cursor_commands() -> anyhow::Result<()> {
    let client = client().on(
        "sp_describe_undeclared_parameters",
        fixtures::suggested_parameters(&[(1, "@id", TypeId::INT, true, false)]),
    );
    let log = client.log();
    let mut client = client;

    let registry = TypeCatalogRegistry::new();
    let descriptor = describe(
        &mut client,
        &registry,
        &input("EXEC dbo.RebuildIndexes @id").with_options(options(ResultType::Cursor)),
    )?;

    assert!(matches!(descriptor.output().shape(), OutputShape::Cursor));
    assert_eq!(descriptor.output().columns().len(), 0);
    assert_eq!(descriptor.parameters().len(), 1);

    // neither introspection path ran
    assert_eq!(log.count_containing("dm_exec_describe_first_result_set"), 0);
    assert_eq!(log.count_containing("FMTONLY"), 0);

    Ok(())
}

#[test]
fn it_describes_a_table_valued_parameter() -> anyhow::Result<()> {
    let mut client = client()
        .on(
            "sp_describe_undeclared_parameters",
            fixtures::suggested_tvp_parameter("@tags", "dbo", "TagList"),
        )
        .on(
            "dm_exec_describe_first_result_set",
            fixtures::introspected_columns(&[]),
        );

    let registry = TypeCatalogRegistry::new();
    let all_optional = CommandOptions {
        all_parameters_optional: true,
        ..CommandOptions::default()
    };

    let descriptor = describe(
        &mut client,
        &registry,
        &input("INSERT INTO tags SELECT * FROM @tags").with_options(all_optional),
    )?;

    let parameter = &descriptor.parameters()[0];
    assert_eq!(parameter.name(), "@tags");
    assert!(parameter.type_info().is_table());
    assert_eq!(parameter.type_info().rust_type(), None);

    // a row set has no null form, so the optional coercion never applies
    assert!(!parameter.optional());

    let table = parameter.type_info().table().expect("a table type");
    assert_eq!(table.name(), "dbo.TagList");
    assert_eq!(table.columns().len(), 2);

    let row = table.row(vec![SqlValue::from("rust"), SqlValue::from(0.9f64)])?;
    assert_eq!(row.values().len(), 2);

    Ok(())
}

#[test]
fn it_marks_inputs_optional_when_requested() -> anyhow::Result<()> {
    let mut client = client()
        .on(
            "sp_describe_undeclared_parameters",
            fixtures::suggested_parameters(&[
                (1, "@name", TypeId::NVARCHAR, true, false),
                (2, "@total", TypeId::INT, false, true),
            ]),
        )
        .on(
            "dm_exec_describe_first_result_set",
            fixtures::introspected_columns(&[]),
        );

    let registry = TypeCatalogRegistry::new();
    let all_optional = CommandOptions {
        all_parameters_optional: true,
        ..CommandOptions::default()
    };

    let descriptor = describe(
        &mut client,
        &registry,
        &input("EXEC dbo.Upsert ...").with_options(all_optional),
    )?;

    let parameters = descriptor.parameters();
    assert!(parameters[0].optional());
    assert!(!parameters[1].optional()); // output parameters are not inputs

    Ok(())
}

#[test]
fn it_applies_single_row_to_composite_shapes() -> anyhow::Result<()> {
    let mut client = client()
        .on(
            "sp_describe_undeclared_parameters",
            fixtures::suggested_parameters(&[]),
        )
        .on(
            "dm_exec_describe_first_result_set",
            fixtures::introspected_columns(&[
                (1, Some("id"), TypeId::INT, false),
                (2, Some("name"), TypeId::NVARCHAR, true),
            ]),
        );

    let registry = TypeCatalogRegistry::new();
    let single_row = CommandOptions {
        single_row: true,
        ..CommandOptions::default()
    };

    let descriptor = describe(
        &mut client,
        &registry,
        &input("SELECT TOP 1 id, name FROM users").with_options(single_row),
    )?;

    assert!(matches!(descriptor.output().shape(), OutputShape::Record(_)));
    assert!(descriptor.output().single_row());
    assert_eq!(descriptor.output().cardinality(), Cardinality::AtMostOne);

    // the table value wraps too; only scalars, row counts and cursors
    // stay unconditional
    let table = CommandOptions {
        result_type: ResultType::Table,
        single_row: true,
        ..CommandOptions::default()
    };

    let descriptor = describe(
        &mut client,
        &registry,
        &input("SELECT TOP 1 id, name FROM users").with_options(table),
    )?;

    assert!(matches!(descriptor.output().shape(), OutputShape::Table(_)));
    assert_eq!(descriptor.output().cardinality(), Cardinality::AtMostOne);

    Ok(())
}

#[test]
fn it_rejects_duplicate_record_columns() -> anyhow::Result<()> {
    let mut client = client()
        .on(
            "sp_describe_undeclared_parameters",
            fixtures::suggested_parameters(&[]),
        )
        .on(
            "dm_exec_describe_first_result_set",
            fixtures::introspected_columns(&[
                (1, Some("id"), TypeId::INT, false),
                (2, Some("id"), TypeId::BIGINT, false),
            ]),
        );

    let registry = TypeCatalogRegistry::new();
    let text = "SELECT a.id, b.id FROM a JOIN b ON 1 = 1";

    let err = describe(&mut client, &registry, &input(text)).unwrap_err();

    match err {
        Error::DuplicateColumn {
            name,
            first,
            second,
        } => {
            assert_eq!(name, "id");
            assert_eq!((first, second), (0, 1));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // tuples address by position and accept the same select list
    let descriptor = describe(
        &mut client,
        &registry,
        &input(text).with_options(options(ResultType::Tuples)),
    )?;

    assert!(matches!(descriptor.output().shape(), OutputShape::Tuple(_)));

    Ok(())
}

#[test]
fn it_resolves_alias_types_for_parameters() -> anyhow::Result<()> {
    let mut client = client()
        .on(
            "sp_describe_undeclared_parameters",
            fixtures::suggested_alias_parameter("@address", "dbo", "Email", TypeId::NVARCHAR, 256),
        )
        .on(
            "dm_exec_describe_first_result_set",
            fixtures::introspected_columns(&[]),
        );

    let registry = TypeCatalogRegistry::new();
    let descriptor = describe(
        &mut client,
        &registry,
        &input("DELETE FROM users WHERE email = @address"),
    )?;

    // dbo.Email is declared nvarchar(128); declarations carry the base name
    let info = descriptor.parameters()[0].type_info();
    assert_eq!(info.name(), "nvarchar");
    assert_eq!(info.rust_type(), Some("String"));
    assert_eq!(info.max_length(), Some(128));

    Ok(())
}

#[test]
fn it_reuses_the_catalog_across_commands() -> anyhow::Result<()> {
    let client = client()
        .on(
            "sp_describe_undeclared_parameters",
            fixtures::suggested_parameters(&[]),
        )
        .on(
            "dm_exec_describe_first_result_set",
            fixtures::introspected_columns(&[(1, Some("n"), TypeId::INT, false)]),
        );
    let log = client.log();
    let mut client = client;

    let registry = TypeCatalogRegistry::new();

    describe(&mut client, &registry, &input("SELECT 1 AS n"))?;
    describe(&mut client, &registry, &input("SELECT 2 AS n"))?;

    // one catalog build serves every command against the same version
    assert_eq!(log.count_containing("FROM sys.types"), 1);
    assert_eq!(log.count_containing("dm_exec_describe_first_result_set"), 2);

    Ok(())
}

#[test]
fn it_rejects_a_blank_connection_target() {
    let client = MockClient::new();
    let log = client.log();
    let mut client = client;

    let registry = TypeCatalogRegistry::new();
    let err = describe(
        &mut client,
        &registry,
        &CommandInput::new("Cmd", "SELECT 1", ConnectionTarget::Url("  ".into())),
    )
    .unwrap_err();

    assert!(matches!(err, Error::EmptyConnectionTarget));

    // rejected before anything touched the wire
    assert!(log.snapshot().is_empty());
}

#[test]
fn it_rejects_an_unparseable_connection_url() {
    let mut client = MockClient::new();

    let registry = TypeCatalogRegistry::new();
    let err = describe(
        &mut client,
        &registry,
        &CommandInput::new(
            "Cmd",
            "SELECT 1",
            ConnectionTarget::Url("not a connection url".into()),
        ),
    )
    .unwrap_err();

    assert!(matches!(err, Error::InvalidConnectionTarget(_)));
}

#[test]
fn it_rejects_servers_below_the_minimum_version() {
    let mut client =
        MockClient::new().on("SERVERPROPERTY", fixtures::product_version("10.50.6000.34"));

    let registry = TypeCatalogRegistry::new();
    let err = describe(&mut client, &registry, &input("SELECT 1")).unwrap_err();

    match err {
        Error::UnsupportedServerVersion { version, minimum } => {
            assert_eq!(version.to_string(), "10.50.6000");
            assert_eq!(minimum, mssql_describe::MINIMUM_SERVER_VERSION);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn it_records_the_source_identity() -> anyhow::Result<()> {
    let mut client = client()
        .on(
            "sp_describe_undeclared_parameters",
            fixtures::suggested_parameters(&[]),
        )
        .on(
            "dm_exec_describe_first_result_set",
            fixtures::introspected_columns(&[(1, Some("n"), TypeId::INT, false)]),
        );

    let registry = TypeCatalogRegistry::new();
    let descriptor = describe(&mut client, &registry, &input("SELECT 1 AS n"))?;

    assert_eq!(descriptor.name(), "Cmd");
    assert_eq!(descriptor.source().server_version().to_string(), "15.0.2000");

    match descriptor.source().id() {
        SourceId::Text(hash) => assert_eq!(hash.len(), 64),
        other => panic!("unexpected identity: {other:?}"),
    }

    Ok(())
}
