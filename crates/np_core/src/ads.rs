use crate::types::Ad;

pub const SIDEBAR: &str = "sidebar";

/// Keep the ads that should show on `page`.
///
/// Ads without a page target run everywhere. With a page identifier, ads
/// targeted at that page (case-insensitive, trimmed) are kept too. Without
/// one, only the untargeted ads are kept.
pub fn ads_for_page(ads: Vec<Ad>, page: Option<&str>) -> Vec<Ad> {
    let page = page
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty());

    ads.into_iter()
        .filter(|ad| match target(ad) {
            None => true,
            Some(target) => page.as_deref() == Some(target.as_str()),
        })
        .collect()
}

fn target(ad: &Ad) -> Option<String> {
    ad.page
        .as_deref()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn ad(title: &str, page: Option<&str>) -> Ad {
        Ad {
            id: Uuid::new_v4(),
            title: title.to_string(),
            image_url: None,
            link_url: None,
            position: SIDEBAR.to_string(),
            page: page.map(str::to_string),
            active: true,
            created_at: Utc::now(),
        }
    }

    fn titles(ads: &[Ad]) -> Vec<&str> {
        ads.iter().map(|a| a.title.as_str()).collect()
    }

    #[test]
    fn test_page_targeting() {
        let ads = vec![
            ad("everywhere", None),
            ad("blank", Some("  ")),
            ad("sports", Some(" Sports ")),
            ad("home", Some("home")),
        ];

        let sports = ads_for_page(ads.clone(), Some("SPORTS"));
        assert_eq!(titles(&sports), vec!["everywhere", "blank", "sports"]);

        let untargeted = ads_for_page(ads.clone(), None);
        assert_eq!(titles(&untargeted), vec!["everywhere", "blank"]);

        let empty_param = ads_for_page(ads, Some(""));
        assert_eq!(titles(&empty_param), vec!["everywhere", "blank"]);
    }
}
