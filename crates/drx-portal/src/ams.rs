// SPDX-License-Identifier: MIT OR Apache-2.0
//! AMS lookup flow: search POST, then the master-detail GET.

use crate::client::PortalClient;
use crate::html::{self, AmsSearch};
use crate::PortalError;
use drx_core::Mawb;
use tracing::info;

/// Search endpoint, relative to the portal origin.
pub const AMS_SEARCH_PATH: &str = "/app/ams/viewMawbs.do";

/// Consolidated outcome of the AMS flow for one MAWB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmsLookup {
    /// The portal has no AWB for this MAWB. When set, every other field is
    /// in its default state and the pipeline short-circuits.
    pub master_not_found: bool,
    /// Results column 7.
    pub total_hawbs: String,
    /// Results column 6.
    pub arrival_date: String,
    /// `#esD` on the master page.
    pub duty: String,
    /// `#esC`.
    pub t11_entries: String,
    /// `#esA`.
    pub entries_accepted: String,
    /// `t11_entries − entries_accepted`, `0` when either side is not a number.
    pub rejected_entries: String,
    /// `#esH`.
    pub houses_7501: String,
}

impl AmsLookup {
    fn not_found() -> Self {
        Self {
            master_not_found: true,
            total_hawbs: "N/A".to_string(),
            arrival_date: "N/A".to_string(),
            duty: "N/A".to_string(),
            t11_entries: "0".to_string(),
            entries_accepted: "0".to_string(),
            rejected_entries: "0".to_string(),
            houses_7501: "0".to_string(),
        }
    }
}

/// Form body for the AMS search POST.
fn search_form(mawb: &Mawb) -> Vec<(String, String)> {
    let pairs: &[(&str, String)] = &[
        ("prefix", mawb.prefix().to_string()),
        ("mawb", mawb.serial().to_string()),
        ("refNo", String::new()),
        ("hawb", String::new()),
        ("arrivalBegin", String::new()),
        ("arrivalEnd", String::new()),
        ("container", String::new()),
        ("cbpStatus", String::new()),
        ("acasStatus", String::new()),
        ("arrivalAirport", String::new()),
        ("carrier", String::new()),
        ("flight", String::new()),
        ("client", "0".to_string()),
        ("clientName", String::new()),
        ("searchByProfile", "true".to_string()),
        ("searchTimePeriod", "Y1".to_string()),
        ("location", "0".to_string()),
        ("user", String::new()),
        ("noPerPage", "25".to_string()),
        ("cfs", "false".to_string()),
        ("pageNo", "0".to_string()),
        ("orderBy", "amb1".to_string()),
    ];
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

/// Run the AMS flow.
///
/// # Errors
///
/// Returns [`PortalError`] for transport failures, parse failures, or a
/// result row without a master link. "Master not found" is not an error; it
/// is reported through [`AmsLookup::master_not_found`].
pub async fn lookup(client: &PortalClient, mawb: &Mawb) -> Result<AmsLookup, PortalError> {
    let timeouts = client.timeouts().clone();

    let response = client
        .post_form(
            AMS_SEARCH_PATH,
            AMS_SEARCH_PATH,
            &search_form(mawb),
            timeouts.ams_search(),
        )
        .await?;

    let row = match html::parse_ams_search(&response.text())? {
        AmsSearch::NotFound => {
            info!(target: "drx.portal", mawb = %mawb, "master not found");
            return Ok(AmsLookup::not_found());
        }
        AmsSearch::Found(row) => row,
    };

    let master_href = row.master_href.ok_or(PortalError::Parse {
        what: "AMS result row carries no master link".to_string(),
    })?;
    let master_url = client.absolutize(&master_href);

    let detail = client
        .get(&master_url, AMS_SEARCH_PATH, timeouts.ams_detail())
        .await?;
    let master = html::parse_ams_master(&detail.text());

    let rejected = match (
        master.t11_entries.parse::<i64>(),
        master.entries_accepted.parse::<i64>(),
    ) {
        (Ok(t11), Ok(accepted)) => t11 - accepted,
        _ => 0,
    };

    info!(
        target: "drx.portal",
        mawb = %mawb,
        hawbs = %row.total_hawbs,
        duty = %master.duty,
        t11 = %master.t11_entries,
        "AMS lookup complete"
    );

    Ok(AmsLookup {
        master_not_found: false,
        total_hawbs: row.total_hawbs,
        arrival_date: row.arrival_date,
        duty: master.duty,
        t11_entries: master.t11_entries,
        entries_accepted: master.entries_accepted,
        rejected_entries: rejected.to_string(),
        houses_7501: master.houses_7501,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_form_splits_prefix_and_serial() {
        let mawb = Mawb::parse("235-94731221").unwrap();
        let form = search_form(&mawb);
        let get = |k: &str| {
            form.iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("prefix"), Some("235"));
        assert_eq!(get("mawb"), Some("94731221"));
        assert_eq!(get("searchTimePeriod"), Some("Y1"));
        assert_eq!(get("noPerPage"), Some("25"));
        assert_eq!(get("location"), Some("0"));
        assert_eq!(get("user"), Some(""));
    }
}
