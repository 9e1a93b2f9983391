//! A small end-to-end demonstration: load a manifest, validate it, run a
//! query, and render a component view to SVG via the null renderer.

use catalog_core::diagram::component_view;
use catalog_core::manifest::{parse_documents, RawEntity};
use catalog_core::render::{NullRenderer, RenderContext, Run};
use catalog_core::repository::{CatalogRepository, LinkTemplateConfig};
use catalog_core::{CatalogResult, Entity, EntityKind, EntityRef};

const DEMO_MANIFEST: &str = r#"
apiVersion: swcat.io/v1
kind: Group
metadata:
  name: team-a
spec:
  type: team
---
apiVersion: swcat.io/v1
kind: Domain
metadata:
  name: payments
spec:
  owner: team-a
---
apiVersion: swcat.io/v1
kind: System
metadata:
  name: billing
spec:
  owner: team-a
  domain: payments
---
apiVersion: swcat.io/v1
kind: API
metadata:
  name: billing-api
spec:
  type: openapi
  lifecycle: production
  owner: team-a
  system: billing
---
apiVersion: swcat.io/v1
kind: Component
metadata:
  name: invoice-service
spec:
  type: service
  lifecycle: production
  owner: team-a
  system: billing
  consumesApis: [billing-api]
"#;

fn main() -> CatalogResult<()> {
    let repo = CatalogRepository::new(Vec::<LinkTemplateConfig>::new());
    for raw in parse_documents(DEMO_MANIFEST) {
        let raw: RawEntity = raw?;
        let entity: Entity = Entity::from_raw(raw)?;
        repo.add(entity)?;
    }
    repo.validate()?;

    let production_services = repo.find(EntityKind::Component, "lifecycle:production")?;
    println!("production components: {}", production_services.len());

    let component_ref = EntityRef::new(EntityKind::Component, "default", "invoice-service");
    let (diagram_source, metadata) = component_view(&repo, &component_ref)?;
    println!("diagram has {} node(s)", metadata.nodes.len());

    let ctx = RenderContext::new();
    let svg = NullRenderer.run(&ctx, &diagram_source)?;
    println!("rendered {} bytes of SVG", svg.len());

    Ok(())
}
