//! Identifier translation over the built-in real-estate mapping.

use db_ask::obfuscation::IdentifierTranslator;
use pretty_assertions::assert_eq;

#[test]
fn test_every_table_round_trips() {
    let translator = IdentifierTranslator::real_estate();

    for table in translator.mapping().tables() {
        let obfuscated = format!("SELECT COUNT(*) FROM {}", table.obfuscated);
        let real = translator.to_real(&obfuscated);
        assert!(real.succeeded);
        assert_eq!(real.text, format!("SELECT COUNT(*) FROM {}", table.real.to_uppercase()));

        let back = translator.to_obfuscated(&real.text);
        assert_eq!(back.text, obfuscated);
    }
}

#[test]
fn test_every_qualified_column_round_trips() {
    let translator = IdentifierTranslator::real_estate();

    for column in translator.mapping().columns() {
        let obfuscated = format!(
            "SELECT {} FROM {}",
            column.obfuscated_qualified(),
            column.obfuscated_table
        );
        let expected = format!(
            "SELECT {} FROM {}",
            column.real_qualified().to_uppercase(),
            column.real_table.to_uppercase()
        );

        let real = translator.to_real(&obfuscated);
        assert_eq!(real.text, expected, "translating {}", obfuscated);
        assert_eq!(translator.to_obfuscated(&real.text).text, obfuscated);
    }
}

#[test]
fn test_price_filter_translates_to_real_schema() {
    let sql = "SELECT item_id, monetary_value FROM real_estate_items WHERE monetary_value > 500000";
    let out = IdentifierTranslator::real_estate().to_real(sql);
    assert!(out.succeeded);
    assert_eq!(out.text, "SELECT PROPERTY_ID, PRICE FROM PROPERTIES WHERE PRICE > 500000");
}

#[test]
fn test_join_across_tables() {
    let out = IdentifierTranslator::real_estate().to_real(
        "SELECT g.city_name, AVG(c.final_amount) FROM commercial_events c \
         JOIN real_estate_items r ON c.item_ref = r.item_id \
         JOIN geographic_areas g ON r.area_ref = g.area_id GROUP BY g.city_name",
    );
    assert_eq!(
        out.text,
        "SELECT g.CITY, AVG(c.SALE_PRICE) FROM TRANSACTIONS c \
         JOIN PROPERTIES r ON c.PROPERTY_ID = r.PROPERTY_ID \
         JOIN LOCATIONS g ON r.LOCATION_ID = g.LOCATION_ID GROUP BY g.CITY"
    );
}

#[test]
fn test_translation_fails_open() {
    let translator = IdentifierTranslator::real_estate().with_regex_size_limit(1);
    let sql = "SELECT city_name FROM geographic_areas";

    let out = translator.to_real(sql);
    assert!(!out.succeeded);
    assert_eq!(out.text, sql);
}

#[test]
fn test_translated_sql_passes_nothing_real_back() {
    let translator = IdentifierTranslator::real_estate();
    let real = "SELECT PROPERTY_ID, PRICE FROM PROPERTIES WHERE STATUS = 'active'";

    let obfuscated = translator.to_obfuscated(real).text;
    assert!(translator.validate(&obfuscated).is_valid());
    assert!(!translator.validate(real).is_valid());
}
