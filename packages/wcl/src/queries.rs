pub const REPORT_META: &str = r#"
query ReportMeta($code: String!) {
    reportData {
        report(code: $code) {
            code
            title
            owner { name }
            startTime
            endTime
            zone { id name }
            fights {
                id
                name
                startTime
                endTime
                kill
                difficulty
                bossPercentage
                averageItemLevel
                encounterID
            }
            masterData(translate: true) {
                actors {
                    id
                    name
                    type
                    subType
                    server
                    icon
                    petOwner
                }
            }
        }
    }
}
"#;

pub const FIGHT_EVENTS: &str = r#"
query FightEvents(
    $code: String!
    $fightID: Int!
    $dataType: EventDataType!
    $startTime: Float!
    $endTime: Float!
    $limit: Int!
) {
    reportData {
        report(code: $code) {
            events(
                fightIDs: [$fightID]
                dataType: $dataType
                startTime: $startTime
                endTime: $endTime
                limit: $limit
            ) {
                data
                nextPageTimestamp
            }
        }
    }
}
"#;
