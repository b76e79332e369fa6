//! Invocations by function name, as a ledger host would submit them

use provenance::{dispatch, Envelope, Invocation, Ledger, MemoryLedger, ProvenanceContract};

fn call(
    contract: &ProvenanceContract,
    ledger: &mut MemoryLedger,
    function: &str,
    args: &[&str],
) -> Envelope {
    dispatch(contract, ledger, &Invocation::new(function, args.iter().copied()))
}

fn ok(envelope: Envelope) -> serde_json::Value {
    assert_eq!(envelope.status, "200", "unexpected envelope: {:?}", envelope);
    envelope.response
}

fn seeded() -> (ProvenanceContract, MemoryLedger) {
    let contract = ProvenanceContract::default();
    let mut ledger = MemoryLedger::new("Org1MSP");
    ok(call(&contract, &mut ledger, "META_addUnit", &["Liter"]));
    ok(call(&contract, &mut ledger, "putAttributeDefinition", &["Quality", "String"]));
    ok(call(&contract, &mut ledger, "META_addAttributeDefinition", &["AmountInLiter", "long"]));
    ok(call(&contract, &mut ledger, "putAttributeDefinition", &["Price", "double"]));
    ok(call(
        &contract,
        &mut ledger,
        "putAssetDefinition",
        &["milklot", r#"["Quality", "AmountInLiter", "Price"]"#],
    ));
    (contract, ledger)
}

#[test]
fn test_schema_calls_return_registry() {
    let (contract, mut ledger) = seeded();

    let registry = ok(call(&contract, &mut ledger, "getDefinition", &[]));
    assert_eq!(registry["units"][0], "Liter");
    assert_eq!(registry["attributeDefinitions"][1]["dataType"], "Integer");

    let milklot = ok(call(&contract, &mut ledger, "META_readMetaDefOfProduct", &["MILKLOT"]));
    assert_eq!(milklot["version"], 1);

    let typed = ok(call(
        &contract,
        &mut ledger,
        "getAttributeDefinitionsOfAsset",
        &["milklot", "1"],
    ));
    assert_eq!(typed["attributes"][2]["dataType"], "Float");

    let data_type = ok(call(
        &contract,
        &mut ledger,
        "META_getDataTypeOfAttributeWithVersion",
        &["Price", "1"],
    ));
    assert_eq!(data_type, "Float");

    let malformed = call(
        &contract,
        &mut ledger,
        "getDataTypeOfAttributeDefinition",
        &["Price", "one"],
    );
    assert_eq!(malformed.status, "400");
    assert_eq!(malformed.response, "Malformatted version number one");

    let duplicate = call(&contract, &mut ledger, "addUnit", &["Liter"]);
    assert_eq!(duplicate.status, "400");

    let removed = ok(call(&contract, &mut ledger, "META_deleteProduct", &["milklot"]));
    assert_eq!(removed["assetDefinitions"].as_array().unwrap().len(), 0);
}

#[test]
fn test_undefined_attributes_listed_together() {
    let (contract, mut ledger) = seeded();
    let envelope = call(
        &contract,
        &mut ledger,
        "putAssetDefinition",
        &["cheese", r#"["Quality", "Color", "Weight"]"#],
    );
    assert_eq!(envelope.status, "400");
    assert_eq!(envelope.response, "The attributes Color, Weight are not defined");
}

#[test]
fn test_asset_lifecycle_by_name() {
    let (contract, mut ledger) = seeded();

    let create = Invocation::new(
        "createObject",
        [
            "milk1",
            "CollectionOne",
            "milklot",
            "50",
            "Liter",
            r#"["Quality", "AmountInLiter"]"#,
            r#"["Bio", "10"]"#,
        ],
    )
    .with_transient("Price", "0.42");
    let created = ok(dispatch(&contract, &mut ledger, &create));
    assert_eq!(created["productName"], "milklot");
    assert_eq!(created["amount"], 50.0);
    assert_eq!(created["privateDataCollection"][0], "CollectionOne");

    let read = ok(call(&contract, &mut ledger, "readObject", &["milk1"]));
    assert_eq!(read["privateData"][0]["name"], "Price");
    assert_eq!(read["privateData"][0]["value"], 0.42);

    ok(call(&contract, &mut ledger, "setReceiver", &["milk1", "Org2MSP"]));
    ledger.set_caller("Org2MSP");
    let owned = ok(call(&contract, &mut ledger, "changeOwner", &["milk1"]));
    assert_eq!(owned["actualOwner"], "Org2MSP");
    assert_eq!(owned["receiver"], "");

    let updated = ok(call(
        &contract,
        &mut ledger,
        "updateAttribute",
        &["milk1", r#"["Quality"]"#, r#"["Raw"]"#],
    ));
    assert_eq!(updated["attributes"][0]["value"], "Raw");

    let private = Invocation::new("setPrivateAttribute", ["milk1", "CollectionOne"])
        .with_transient("Price", "0.5");
    let partition = ok(dispatch(&contract, &mut ledger, &private));
    assert_eq!(partition["attributes"][0]["value"], 0.5);

    let history = ok(call(&contract, &mut ledger, "getAssetHistoryList", &["milk1"]));
    assert_eq!(history.as_array().unwrap().len(), 4);

    assert_eq!(ok(call(&contract, &mut ledger, "objectExists", &["milk1"])), true);
    assert_eq!(
        ok(call(&contract, &mut ledger, "privateObjectExists", &["milk1", "CollectionOne"])),
        true
    );
    ok(call(&contract, &mut ledger, "deleteObject", &["milk1"]));
    assert_eq!(ok(call(&contract, &mut ledger, "containsAsset", &["milk1"])), false);
}

#[test]
fn test_lineage_and_alarm_by_name() {
    let (contract, mut ledger) = seeded();
    for (key, amount) in [("milk1", "20"), ("milk2", "0")] {
        let create = Invocation::new(
            "createAsset",
            [
                key,
                "",
                "milklot",
                amount,
                "Liter",
                r#"["Quality", "AmountInLiter", "Price"]"#,
                r#"["Bio", "10", "0.3"]"#,
            ],
        );
        ok(dispatch(&contract, &mut ledger, &create));
    }

    let successor = ok(call(
        &contract,
        &mut ledger,
        "addPredecessor",
        &["milk1", "milk2", "-5", "5"],
    ));
    assert_eq!(successor["amount"], 5.0);
    assert_eq!(successor["predecessor"][0]["peerKey"], "milk1");

    let overdraw = call(&contract, &mut ledger, "addPredecessor", &["milk1", "milk2", "16"]);
    assert_eq!(overdraw.status, "400");

    let alarmed = ok(call(&contract, &mut ledger, "activateAlarm", &["milk1"]));
    assert_eq!(alarmed["alarmFlag"], true);
    let milk2 = ok(call(&contract, &mut ledger, "getAsset", &["milk2"]));
    assert_eq!(milk2["alarmFlag"], true);
    assert_eq!(ledger.events().len(), 1);
}

#[test]
fn test_acceptance_rules_by_name() {
    let (contract, mut ledger) = seeded();
    let create = Invocation::new(
        "createAsset",
        [
            "milk1",
            "",
            "milklot",
            "20",
            "Liter",
            r#"["Quality", "AmountInLiter", "Price"]"#,
            r#"["Bio", "3", "0.3"]"#,
        ],
    );
    ok(dispatch(&contract, &mut ledger, &create));

    ledger.set_caller("Org2MSP");
    ok(call(
        &contract,
        &mut ledger,
        "addAcceptanceCondition",
        &["RuleCollection", "milklot", "AmountInLiter", "gt5"],
    ));
    ok(call(&contract, &mut ledger, "setAutoAccept", &["RuleCollection", "true"]));

    ledger.set_caller("Org1MSP");
    let rules = ok(call(
        &contract,
        &mut ledger,
        "getAcceptanceRules",
        &["RuleCollection", "Org2MSP"],
    ));
    assert_eq!(rules["productToAttributeAndRule"]["milklot"]["AmountInLiter"], "gt5");

    let offer = ["milk1", "Org2MSP", "RuleCollection"];
    let rejected = call(&contract, &mut ledger, "setReceiver", &offer);
    assert_eq!(rejected.status, "400");
    assert_eq!(
        rejected.response,
        "Acceptance rule violated: AmountInLiter = 3 does not satisfy gt5"
    );

    ok(call(
        &contract,
        &mut ledger,
        "updateAttribute",
        &["milk1", r#"["AmountInLiter"]"#, r#"["8"]"#],
    ));
    let accepted = ok(call(&contract, &mut ledger, "setReceiver", &offer));
    assert_eq!(accepted["actualOwner"], "Org2MSP");

    ledger.set_caller("Org2MSP");
    ok(call(&contract, &mut ledger, "deleteAcceptanceRules", &["RuleCollection", "milklot"]));
}

#[test]
fn test_corruption_maps_to_internal_status() {
    let (contract, mut ledger) = seeded();
    ledger.put_state("METADEF", b"\"broken\"".to_vec()).unwrap();

    let envelope = call(&contract, &mut ledger, "getDefinition", &[]);
    assert_eq!(envelope.status, "500");
}
