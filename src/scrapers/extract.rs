use crate::models::Item;
use crate::scrapers::humanize::{Humanizer, Pause};
use crate::scrapers::traits::{PageSession, StageResult};
use crate::scrapers::types::{ListingSelectors, NodeRef};
use tracing::{debug, info};

/// Turn the currently present cards into items.
///
/// Cards that are blank, not bookable, or fail to read are skipped one by one.
pub fn extract_items<S, P>(
    page: &S,
    cards: &[NodeRef],
    selectors: &ListingSelectors,
    human: &mut Humanizer<P>,
) -> Vec<Item>
where
    S: PageSession + ?Sized,
    P: Pause,
{
    let mut items = Vec::new();

    for (idx, card) in cards.iter().enumerate() {
        match extract_card(page, *card, selectors, human) {
            Ok(Some(item)) => {
                debug!("Card {}: {}", idx, item.identity);
                items.push(item);
            }
            Ok(None) => debug!("Card {} is not bookable, skipping", idx),
            Err(err) => debug!("Card {} could not be read: {}", idx, err),
        }
    }

    info!("Extracted {} bookable items from {} cards", items.len(), cards.len());
    items
}

fn extract_card<S, P>(
    page: &S,
    card: NodeRef,
    selectors: &ListingSelectors,
    human: &mut Humanizer<P>,
) -> StageResult<Option<Item>>
where
    S: PageSession + ?Sized,
    P: Pause,
{
    let text = page.read_text(card)?;
    if text.trim().is_empty() || !text.contains(&selectors.availability_marker) {
        return Ok(None);
    }

    let identity = match booking_link(page, card, selectors)? {
        Some(link) => link,
        None => human.placeholder_identity(),
    };

    Ok(Some(Item::new(identity, &text)))
}

/// Target of the first anchor in the card whose text carries the availability marker
fn booking_link<S>(page: &S, card: NodeRef, selectors: &ListingSelectors) -> StageResult<Option<String>>
where
    S: PageSession + ?Sized,
{
    for anchor in page.find_within(card, &selectors.link)? {
        if page.read_text(anchor)?.contains(&selectors.availability_marker) {
            return Ok(page
                .read_attribute(anchor, "href")?
                .filter(|href| !href.trim().is_empty()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::humanize::tests::seeded;
    use crate::scrapers::static_page::StaticPage;

    const LISTING: &str = r#"
        <html><body>
          <div class="card card-style">
            <p>Hamburg &lt;Altona&gt; &amp; more</p>
            <a href="/info">Details</a>
            <a href="https://slots.example.org/book/42">Book now!</a>
          </div>
          <div class="card card-style">
            <p>Berlin Mitte</p>
            <span>Book now!</span>
          </div>
          <div class="card card-style">
            <p>Munich</p>
            <span>Sold out</span>
          </div>
          <div class="card card-style">   </div>
        </body></html>
    "#;

    fn run(markup: &str) -> Vec<Item> {
        let page = StaticPage::from_markup(markup);
        let selectors = ListingSelectors::default();
        let cards = page.find_all(&selectors.card).unwrap();
        extract_items(&page, &cards, &selectors, &mut seeded(11))
    }

    #[test]
    fn keeps_only_bookable_cards() {
        let items = run(LISTING);
        assert_eq!(items.len(), 2);
        assert!(items[0].display_text.starts_with("Hamburg <Altona> & more"));
        assert!(items[1].display_text.starts_with("Berlin Mitte"));
    }

    #[test]
    fn identity_comes_from_the_booking_anchor() {
        let items = run(LISTING);
        assert_eq!(items[0].identity, "https://slots.example.org/book/42");
        assert!(items[0]
            .display_text
            .ends_with("\n Link: https://slots.example.org/book/42"));
    }

    #[test]
    fn cards_without_booking_link_get_placeholder_identity() {
        let items = run(LISTING);
        assert!(items[1].identity.starts_with("not_found_link_"));
        assert!(items[1].display_text.ends_with(&items[1].identity));
    }

    #[test]
    fn no_cards_yields_no_items() {
        assert!(run("<html><body><p>Nothing here</p></body></html>").is_empty());
    }
}
