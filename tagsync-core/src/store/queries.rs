//! GraphQL documents sent to the store.

use super::EntityKind;
use crate::types::ItemKind;

pub const SYSTEM_STATUS: &str = "query { systemStatus { databaseSchema } }";

pub const LIST_SCRAPERS: &str = r#"
query ListScrapers($types: [ScrapeContentType!]!) {
    listScrapers(types: $types) {
        id
        name
        scene { supported_scrapes }
        image { supported_scrapes }
    }
}"#;

const ITEM_FIELDS: &str = r#"
        count
        ITEMS {
            id
            title
            files {
                path
                fingerprints { type value }
            }
            tags { id name }
            organized
        }"#;

pub const ALL_TAGS: &str = r#"
query AllTags {
    findTags(filter: { per_page: -1 }) {
        tags { id name description }
    }
}"#;

pub const TAG_UPDATE: &str = r#"
mutation TagUpdate($input: TagUpdateInput!) {
    tagUpdate(input: $input) { id }
}"#;

/// `findImages` or `findScenes` with a page filter and an item filter.
pub fn find_items(kind: ItemKind) -> String {
    let (op, filter_type, filter_var, items) = match kind {
        ItemKind::Image => ("findImages", "ImageFilterType", "image_filter", "images"),
        ItemKind::Scene => ("findScenes", "SceneFilterType", "scene_filter", "scenes"),
    };
    format!(
        "query FindItems($filter: FindFilterType, ${filter_var}: {filter_type}) {{\n    \
         {op}(filter: $filter, {filter_var}: ${filter_var}) {{{fields}\n    }}\n}}",
        fields = ITEM_FIELDS.replace("ITEMS", items),
    )
}

pub fn scrape_single(kind: ItemKind) -> String {
    let (op, input_type, credit) = match kind {
        ItemKind::Image => ("scrapeSingleImage", "ScrapeSingleImageInput", "photographer"),
        ItemKind::Scene => ("scrapeSingleScene", "ScrapeSingleSceneInput", "director"),
    };
    format!(
        r#"query ScrapeSingle($source: ScraperSourceInput!, $input: {input_type}!) {{
    {op}(source: $source, input: $input) {{
        title
        code
        details
        {credit}
        urls
        date
        tags {{ stored_id name }}
        performers {{ stored_id name }}
        studio {{ stored_id name }}
    }}
}}"#
    )
}

/// Name-search query for an entity kind, and the response field holding it.
pub fn find_entity(kind: EntityKind) -> (String, &'static str, &'static str) {
    let (op, list) = match kind {
        EntityKind::Tag => ("findTags", "tags"),
        EntityKind::Performer => ("findPerformers", "performers"),
        EntityKind::Studio => ("findStudios", "studios"),
    };
    let query = format!(
        "query FindEntity($filter: FindFilterType) {{ {op}(filter: $filter) {{ {list} {{ id name }} }} }}"
    );
    (query, op, list)
}

pub fn create_entity(kind: EntityKind) -> (String, &'static str) {
    let (op, input_type) = match kind {
        EntityKind::Tag => ("tagCreate", "TagCreateInput"),
        EntityKind::Performer => ("performerCreate", "PerformerCreateInput"),
        EntityKind::Studio => ("studioCreate", "StudioCreateInput"),
    };
    let query = format!(
        "mutation CreateEntity($input: {input_type}!) {{ {op}(input: $input) {{ id name }} }}"
    );
    (query, op)
}

pub fn update_item(kind: ItemKind) -> (String, &'static str) {
    let (op, input_type) = match kind {
        ItemKind::Image => ("imageUpdate", "ImageUpdateInput"),
        ItemKind::Scene => ("sceneUpdate", "SceneUpdateInput"),
    };
    let query = format!("mutation UpdateItem($input: {input_type}!) {{ {op}(input: $input) {{ id }} }}");
    (query, op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_items_names_kind_specific_fields() {
        let q = find_items(ItemKind::Scene);
        assert!(q.contains("findScenes(filter: $filter, scene_filter: $scene_filter)"));
        assert!(q.contains("scenes {"));
        assert!(q.contains("$scene_filter: SceneFilterType"));
    }

    #[test]
    fn test_scrape_single_credit_field() {
        assert!(scrape_single(ItemKind::Image).contains("photographer"));
        assert!(scrape_single(ItemKind::Scene).contains("director"));
    }
}
