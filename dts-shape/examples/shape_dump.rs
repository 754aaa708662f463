use dts_shape::{Layout, Shape, decode_shape, decode_shape_auto};
use serde_json::json;
use std::path::PathBuf;

fn load_shape(path: &PathBuf, layout: Option<Layout>) -> Shape {
    let bytes = std::fs::read(path).expect("read shape");
    match layout {
        Some(layout) => decode_shape(&bytes, layout),
        None => decode_shape_auto(&bytes),
    }
    .expect("decode shape")
}

fn main() {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut positional = Vec::<String>::new();
    let mut layout: Option<Layout> = None;
    let mut full = false;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--layout" => {
                layout = match args.get(i + 1).map(String::as_str) {
                    Some("linear") => Some(Layout::Linear),
                    Some("split") => Some(Layout::Split),
                    other => panic!("--layout expects linear or split, got {other:?}"),
                };
                i += 2;
            }
            "--full" => {
                full = true;
                i += 1;
            }
            other => {
                positional.push(other.to_string());
                i += 1;
            }
        }
    }

    let Some(path) = positional.first().map(PathBuf::from) else {
        eprintln!("usage: shape_dump <file.dts> [--layout linear|split] [--full]");
        std::process::exit(2);
    };
    let shape = load_shape(&path, layout);

    if full {
        println!(
            "{}",
            serde_json::to_string_pretty(&shape).expect("serialize shape")
        );
        return;
    }

    let name = |index: i32| shape.name(index).unwrap_or("<none>");

    let nodes: Vec<_> = shape
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            json!({
                "i": i,
                "name": name(node.name),
                "parent": node.parent,
                "firstChild": node.first_child,
                "firstObject": node.first_object,
            })
        })
        .collect();

    let objects: Vec<_> = shape
        .objects
        .iter()
        .enumerate()
        .map(|(i, object)| {
            let meshes: Vec<_> = shape
                .meshes
                .get(object.mesh_range())
                .unwrap_or_default()
                .iter()
                .map(|mesh| {
                    json!({
                        "type": format!("{:?}", mesh.mesh_type()),
                        "polys": mesh.poly_count(),
                        "parent": mesh.parent(),
                    })
                })
                .collect();
            json!({
                "i": i,
                "name": name(object.name),
                "node": object.node,
                "meshes": meshes,
            })
        })
        .collect();

    let details: Vec<_> = shape
        .detail_levels
        .iter()
        .map(|dl| {
            json!({
                "name": name(dl.name),
                "subShape": dl.sub_shape,
                "objectDetail": dl.object_detail,
                "size": dl.size,
                "polys": dl.poly_count,
            })
        })
        .collect();

    let sequences: Vec<_> = shape
        .sequences
        .iter()
        .map(|seq| {
            json!({
                "name": name(seq.name),
                "keyframes": seq.num_keyframes,
                "duration": seq.duration,
                "cyclic": seq.is_cyclic(),
                "blend": seq.is_blend(),
            })
        })
        .collect();

    let materials: Vec<_> = shape
        .materials
        .materials
        .iter()
        .map(|m| json!({"name": m.name, "flags": m.flags}))
        .collect();

    let out = json!({
        "version": shape.version,
        "exporterVersion": shape.exporter_version,
        "radius": shape.radius,
        "bounds": {"min": shape.bounds.min.to_array(), "max": shape.bounds.max.to_array()},
        "nodes": nodes,
        "objects": objects,
        "details": details,
        "sequences": sequences,
        "materials": materials,
    });
    println!("{}", serde_json::to_string_pretty(&out).expect("serialize summary"));
}
