//! Demo data for local runs.

use tracing::info;

use shared_types::NewRfp;

use super::{RecordStore, SqliteRecordStore, StoreError};

pub const DEMO_USER_EMAIL: &str = "demo@rfp-automation.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub user_id: String,
    pub rfps_inserted: usize,
}

struct SampleRfp {
    title: &'static str,
    source: &'static str,
    source_url: &'static str,
    specs: &'static [&'static str],
}

const SAMPLE_RFPS: &[SampleRfp] = &[
    SampleRfp {
        title: "Industrial Pump System RFP",
        source: "ThomasNet",
        source_url: "https://thomasnet.com/rfq/12847",
        specs: &[
            "Flow Rate: 500 GPM minimum",
            "Maximum Pressure: 150 PSI",
            "Material: Stainless Steel 316",
            "Motor: 25 HP, 3-phase, 480V",
            "Certifications: API 610, ISO 9001",
        ],
    },
    SampleRfp {
        title: "Hydraulic Valve Assembly",
        source: "Alibaba",
        source_url: "https://alibaba.com/inquiry/HVA-2025-001",
        specs: &[
            "Valve Type: Directional Control",
            "Port Size: 3/4 inch NPT",
            "Operating Pressure: 3000 PSI",
            "Temperature Range: -20°F to 200°F",
            "Seal Material: Viton",
        ],
    },
    SampleRfp {
        title: "Custom Bearing Manufacturing",
        source: "Made-in-China",
        source_url: "https://made-in-china.com/rfq/bearing-2025",
        specs: &[
            "Bearing Type: Tapered Roller",
            "Bore Diameter: 100mm",
            "Outer Diameter: 180mm",
            "Width: 46mm",
            "Load Rating: 250kN radial",
        ],
    },
    SampleRfp {
        title: "Precision Gearbox Components",
        source: "ThomasNet",
        source_url: "https://thomasnet.com/rfq/15293",
        specs: &[
            "Gear Ratio: 10:1",
            "Input Speed: 1800 RPM",
            "Torque Capacity: 500 lb-ft",
            "Housing Material: Cast Iron",
            "Lubrication: Oil Bath",
        ],
    },
    SampleRfp {
        title: "Industrial Motor Housing",
        source: "GlobalSpec",
        source_url: "https://globalspec.com/rfq/motor-housing",
        specs: &[
            "Frame Size: NEMA 256T",
            "Material: Aluminum Alloy",
            "Finish: Powder Coated",
            "Mounting: Foot Mounted",
            "IP Rating: IP65",
        ],
    },
];

/// Creates the demo user and, if they own no RFPs yet, the sample RFPs.
pub async fn seed_demo_data(store: &SqliteRecordStore) -> Result<SeedSummary, StoreError> {
    let user_id = store
        .ensure_user(DEMO_USER_EMAIL, "Demo User", "admin")
        .await?;

    if store.count_rfps_for_user(&user_id).await? > 0 {
        info!(user_id = %user_id, "demo RFPs already present, skipping seed");
        return Ok(SeedSummary {
            user_id,
            rfps_inserted: 0,
        });
    }

    let mut inserted = 0;
    for sample in SAMPLE_RFPS {
        let rfp = store
            .insert_rfp(NewRfp {
                user_id: user_id.clone(),
                title: sample.title.to_string(),
                content: None,
                source: sample.source.to_string(),
                source_url: Some(sample.source_url.to_string()),
                specs: sample.specs.iter().map(|s| (*s).to_string()).collect(),
            })
            .await?;
        info!(rfp_id = %rfp.id, title = %rfp.title, "seeded RFP");
        inserted += 1;
    }

    Ok(SeedSummary {
        user_id,
        rfps_inserted: inserted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = SqliteRecordStore::new(connect_in_memory().await.unwrap());

        let first = seed_demo_data(&store).await.unwrap();
        assert_eq!(first.rfps_inserted, SAMPLE_RFPS.len());

        let second = seed_demo_data(&store).await.unwrap();
        assert_eq!(second.user_id, first.user_id);
        assert_eq!(second.rfps_inserted, 0);
        assert_eq!(
            store.count_rfps_for_user(&first.user_id).await.unwrap(),
            SAMPLE_RFPS.len() as i64
        );
    }
}
