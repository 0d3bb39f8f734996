use style_transfer as ts;

fn main() -> Result<(), ts::Error> {
    let session = ts::Session::<ts::DefaultBackend>::builder()
        // load the image whose subject matter we want to keep
        .content(&"imgs/portrait.jpg")
        // load the image whose texture we want to borrow
        .style(&"imgs/starry_night.jpg")
        // a pretrained extractor record makes the transfer faithful
        .weights("weights/vgg16.mpk")
        .iterations(500)
        .build()?;

    // optimize a copy of the content image toward the style statistics
    let stylized = session.run(None)?;

    // save the result to the disk
    stylized.save("out/01.png")
}
